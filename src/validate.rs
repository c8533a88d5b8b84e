//! Argument validation for bridge commands
//!
//! Destination paths must be absolute and name a file; URLs must be
//! absolute http(s) with a host. The command layer runs these before the
//! engine ever sees an argument, so engine methods can assume well-formed
//! inputs.

use crate::error::{Error, Result};
use std::path::PathBuf;
use url::Url;

/// Parse a destination path argument.
///
/// Accepts a `/`-rooted filesystem path or a `file://` URL, either of
/// which must name a file. Returns the plain filesystem path, so the
/// function is idempotent on accepted inputs.
pub fn parse_path(raw: &str) -> Result<PathBuf> {
    let path = if raw.starts_with("file://") {
        Url::parse(raw)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| Error::InvalidPath(raw.to_string()))?
    } else {
        PathBuf::from(raw)
    };

    if !path.is_absolute() || path.file_name().is_none() {
        return Err(Error::InvalidPath(raw.to_string()));
    }
    Ok(path)
}

/// Parse a download URL argument: absolute, `http` or `https`, non-empty
/// host.
pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(Error::InvalidUrl(raw.to_string())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests use unwrap for clarity
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_path_accepts_rooted_paths() {
        assert_eq!(
            parse_path("/downloads/a.bin").unwrap(),
            Path::new("/downloads/a.bin")
        );
    }

    #[test]
    fn test_parse_path_accepts_file_urls() {
        assert_eq!(
            parse_path("file:///downloads/a.bin").unwrap(),
            Path::new("/downloads/a.bin")
        );
    }

    #[test]
    fn test_parse_path_rejects_relative_and_bare() {
        for raw in ["a.bin", "downloads/a.bin", "", "file://", "file:///"] {
            assert!(parse_path(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_parse_path_is_idempotent() {
        for raw in ["/downloads/a.bin", "file:///downloads/a.bin"] {
            let once = parse_path(raw).unwrap();
            let twice = parse_path(once.to_str().unwrap()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_parse_url_accepts_http_and_https() {
        assert!(parse_url("http://example.com/a.bin").is_ok());
        assert!(parse_url("https://example.com/a.bin").is_ok());
    }

    #[test]
    fn test_parse_url_rejects_other_schemes_and_hostless() {
        for raw in ["ftp://example.com/a.bin", "example.com/a.bin", "https://", ""] {
            assert!(parse_url(raw).is_err(), "accepted {raw:?}");
        }
    }
}
