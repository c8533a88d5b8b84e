//! Download record value types
//!
//! A record describes one download, keyed by its destination path. Records
//! are immutable values; transitions produce new records and always flow
//! through the engine so persistence and event emission stay ordered.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lifecycle status of a download.
///
/// Only `Idle`, `InProgress` and `Paused` are ever persisted. `Pending`
/// marks "no record exists for this path" in query results, `Cancelled` and
/// `Completed` appear in responses and events for records that have just
/// been removed, and `Unknown` is reserved for client-side stubs whose
/// status cannot be determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadStatus {
    /// Status cannot be determined.
    Unknown,
    /// No record exists for the queried path.
    Pending,
    /// Created but not started.
    Idle,
    /// A transfer worker is running.
    InProgress,
    /// Stopped by the user; the partial file is kept for resume.
    Paused,
    /// Removed, either by the user or after a transfer failure.
    Cancelled,
    /// Finished and renamed into place.
    Completed,
}

/// Canonical descriptor of one download.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    /// Source URL. Empty only on the synthetic `Pending` record.
    pub url: String,
    /// Absolute destination path; the record's primary key.
    pub path: PathBuf,
    /// Percent complete in `[0.0, 100.0]`.
    pub progress: f64,
    /// Current lifecycle status.
    pub status: DownloadStatus,
    /// Opaque platform resume token, when one exists. Resume does not
    /// require it; the partial file's size is the resume point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_data_path: Option<PathBuf>,
}

impl DownloadRecord {
    /// Create a fresh `Idle` record.
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            progress: 0.0,
            status: DownloadStatus::Idle,
            resume_data_path: None,
        }
    }

    /// Synthetic record returned when no download exists for `path`.
    /// Never persisted.
    pub fn pending(path: impl Into<PathBuf>) -> Self {
        Self {
            url: String::new(),
            path: path.into(),
            progress: 0.0,
            status: DownloadStatus::Pending,
            resume_data_path: None,
        }
    }

    /// Copy of this record at `progress` percent, status `InProgress`.
    #[must_use]
    pub fn with_progress(&self, progress: f64) -> Self {
        Self {
            progress,
            status: DownloadStatus::InProgress,
            ..self.clone()
        }
    }

    /// Copy of this record with `status`. `Completed` forces progress
    /// to 100.
    #[must_use]
    pub fn with_status(&self, status: DownloadStatus) -> Self {
        Self {
            progress: if status == DownloadStatus::Completed {
                100.0
            } else {
                self.progress
            },
            status,
            ..self.clone()
        }
    }
}

/// Result of every mutating engine call.
///
/// `expected_status` is the status a successful transition from the prior
/// state would produce; `is_expected_status` says whether the returned
/// record actually carries it. A caller that pauses an `Idle` download gets
/// the unchanged record back with `is_expected_status == false` and needs
/// no second round trip to detect the no-op.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    /// The (possibly unchanged) record after the call.
    pub download: DownloadRecord,
    /// Status a successful transition would have produced.
    pub expected_status: DownloadStatus,
    /// Whether `download.status` matches `expected_status`.
    pub is_expected_status: bool,
}

impl ActionResponse {
    /// Build a response for `download`, deriving the expectation flag.
    pub fn new(download: DownloadRecord, expected_status: DownloadStatus) -> Self {
        let is_expected_status = download.status == expected_status;
        Self {
            download,
            expected_status,
            is_expected_status,
        }
    }
}

/// Compute the partial-file sibling (`<path>.download`) for a destination.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Suffix of the temporary file a transfer streams into.
pub const PART_SUFFIX: &str = ".download";

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests use unwrap for clarity
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization_is_camel_case() {
        let json = serde_json::to_string(&DownloadStatus::InProgress).unwrap();
        assert_eq!(json, "\"inProgress\"");
        let json = serde_json::to_string(&DownloadStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }

    #[test]
    fn test_with_progress_sets_in_progress() {
        let record = DownloadRecord::new("https://example.com/a.bin", "/tmp/a.bin");
        let updated = record.with_progress(42.5);

        assert_eq!(updated.status, DownloadStatus::InProgress);
        assert!((updated.progress - 42.5).abs() < f64::EPSILON);
        // The original is untouched
        assert_eq!(record.status, DownloadStatus::Idle);
        assert_eq!(record.progress, 0.0);
    }

    #[test]
    fn test_completed_forces_full_progress() {
        let record = DownloadRecord::new("https://example.com/a.bin", "/tmp/a.bin")
            .with_progress(99.2)
            .with_status(DownloadStatus::Completed);

        assert_eq!(record.progress, 100.0);
        assert_eq!(record.status, DownloadStatus::Completed);
    }

    #[test]
    fn test_pause_keeps_progress() {
        let record = DownloadRecord::new("https://example.com/a.bin", "/tmp/a.bin")
            .with_progress(37.0)
            .with_status(DownloadStatus::Paused);

        assert_eq!(record.progress, 37.0);
        assert_eq!(record.status, DownloadStatus::Paused);
    }

    #[test]
    fn test_record_round_trip_ignores_unknown_fields() {
        let json = r#"{
            "url": "https://example.com/a.bin",
            "path": "/tmp/a.bin",
            "progress": 12.0,
            "status": "paused",
            "someFutureField": true
        }"#;
        let record: DownloadRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.status, DownloadStatus::Paused);
        assert_eq!(record.path, PathBuf::from("/tmp/a.bin"));
        assert_eq!(record.resume_data_path, None);
    }

    #[test]
    fn test_resume_data_path_omitted_when_absent() {
        let record = DownloadRecord::new("https://example.com/a.bin", "/tmp/a.bin");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("resumeDataPath"));

        let record = DownloadRecord {
            resume_data_path: Some(PathBuf::from("/cache/blob.resumedata")),
            ..record
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"resumeDataPath\":\"/cache/blob.resumedata\""));
    }

    #[test]
    fn test_action_response_expectation_flag() {
        let record = DownloadRecord::new("https://example.com/a.bin", "/tmp/a.bin");

        let matched = ActionResponse::new(record.clone(), DownloadStatus::Idle);
        assert!(matched.is_expected_status);

        let no_op = ActionResponse::new(record, DownloadStatus::Paused);
        assert!(!no_op.is_expected_status);
    }

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/tmp/a.bin")),
            PathBuf::from("/tmp/a.bin.download")
        );
    }
}
