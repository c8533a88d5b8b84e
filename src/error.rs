//! Error types for the download engine
//!
//! Only argument and lookup failures are returned synchronously from engine
//! calls. Transfer failures happen long after `start` returned, so they are
//! folded into a `Cancelled` event plus record removal; the detail lives in
//! the logs. Store save failures are logged and swallowed inside the store.

use std::path::PathBuf;

/// Errors surfaced by the download engine and its command bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path argument is not absolute or names no file.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The URL argument is not an absolute http(s) URL with a host.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// No download record exists for the given path.
    #[error("no download for path: {}", .0.display())]
    NotFound(PathBuf),

    /// An HTTP or I/O failure observed by a transfer worker. Routed to the
    /// engine's failure handler, never returned from a command.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Writing `downloads.json` failed. The in-memory store remains
    /// authoritative; the next successful save resynchronizes the file.
    #[error("failed to save download store: {0}")]
    StoreSave(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a transfer failure with a formatted reason.
    pub(crate) fn transfer(reason: impl Into<String>) -> Self {
        Self::Transfer(reason.into())
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
