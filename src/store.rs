//! Persistent download record store
//!
//! An ordered collection of records mirrored to a single JSON array at
//! `<data_dir>/downloads.json`. Every persisted mutation rewrites the whole
//! array through a temp file that is renamed over the target, so a crash
//! leaves the previous file intact. A missing or unreadable file loads as
//! an empty store.
//!
//! Save failures are logged and swallowed: a broken disk must not stop
//! in-flight transfers, and the in-memory state stays authoritative until
//! the next successful save resynchronizes the file.

use crate::record::DownloadRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// File name of the persisted record array inside the data directory.
pub const STORE_FILE: &str = "downloads.json";

/// Serialized, JSON-file-backed collection of download records.
///
/// Cloning is cheap and shares the underlying state; all operations take a
/// single critical section on the record list.
#[derive(Clone)]
pub struct DownloadStore {
    inner: Arc<Inner>,
}

struct Inner {
    records: RwLock<Vec<DownloadRecord>>,
    file_path: PathBuf,
}

impl DownloadStore {
    /// Load the store from `data_dir`, creating the directory if needed.
    pub fn load(data_dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            log::warn!(
                "Failed to create data directory {}: {e}",
                data_dir.display()
            );
        }

        let file_path = data_dir.join(STORE_FILE);
        let records = match std::fs::read(&file_path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<DownloadRecord>>(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    log::warn!(
                        "Ignoring corrupt download store {}: {e}",
                        file_path.display()
                    );
                    Vec::new()
                }
            },
            // Missing file is the normal first-run case
            Err(_) => Vec::new(),
        };

        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(records),
                file_path,
            }),
        }
    }

    /// Snapshot of all records in insertion order.
    pub async fn list(&self) -> Vec<DownloadRecord> {
        self.inner.records.read().await.clone()
    }

    /// Record keyed by `path`, if any.
    pub async fn find_by_path(&self, path: &Path) -> Option<DownloadRecord> {
        self.inner
            .records
            .read()
            .await
            .iter()
            .find(|r| r.path == path)
            .cloned()
    }

    /// First record with a matching URL. Convenience lookup; URLs are not
    /// unique across records.
    pub async fn find_by_url(&self, url: &str) -> Option<DownloadRecord> {
        self.inner
            .records
            .read()
            .await
            .iter()
            .find(|r| r.url == url)
            .cloned()
    }

    /// Append a new record and persist.
    pub async fn append(&self, record: DownloadRecord) {
        let mut records = self.inner.records.write().await;
        records.push(record);
        self.save(&records);
    }

    /// Replace the record with the same path, appending if absent. With
    /// `persist` false the change stays memory-only; progress ticks use
    /// this to avoid a disk write per percent.
    pub async fn update(&self, record: DownloadRecord, persist: bool) {
        let mut records = self.inner.records.write().await;
        if let Some(existing) = records.iter_mut().find(|r| r.path == record.path) {
            *existing = record;
        } else {
            records.push(record);
        }
        if persist {
            self.save(&records);
        }
    }

    /// Remove and return the record keyed by `path`, persisting the
    /// shrunken list.
    pub async fn remove(&self, path: &Path) -> Option<DownloadRecord> {
        let mut records = self.inner.records.write().await;
        let index = records.iter().position(|r| r.path == path)?;
        let record = records.remove(index);
        self.save(&records);
        Some(record)
    }

    /// Write the current in-memory state to disk.
    pub async fn flush(&self) {
        let records = self.inner.records.read().await;
        self.save(&records);
    }

    fn save(&self, records: &[DownloadRecord]) {
        if let Err(e) = self.write_atomic(records).map_err(crate::Error::StoreSave) {
            log::warn!("{e} ({})", self.inner.file_path.display());
        }
    }

    // Full rewrite through a temp sibling + rename; the old file survives
    // any failure before the rename.
    fn write_atomic(&self, records: &[DownloadRecord]) -> std::io::Result<()> {
        let dir = self
            .inner
            .file_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.inner.file_path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests use unwrap for clarity
mod tests {
    use super::*;
    use crate::record::DownloadStatus;
    use tempfile::tempdir;

    fn record(path: &str) -> DownloadRecord {
        DownloadRecord::new("https://example.com/a.bin", path)
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = DownloadStore::load(dir.path());
        store.append(record("/tmp/a.bin")).await;
        store
            .append(record("/tmp/b.bin").with_status(DownloadStatus::Paused))
            .await;

        let reloaded = DownloadStore::load(dir.path());
        let records = reloaded.list().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, PathBuf::from("/tmp/a.bin"));
        assert_eq!(records[1].status, DownloadStatus::Paused);
        assert_eq!(records, store.list().await);
    }

    #[tokio::test]
    async fn test_update_without_persist_is_memory_only() {
        let dir = tempdir().unwrap();
        let store = DownloadStore::load(dir.path());
        store.append(record("/tmp/a.bin")).await;

        store
            .update(record("/tmp/a.bin").with_progress(50.0), false)
            .await;
        assert_eq!(
            store
                .find_by_path(Path::new("/tmp/a.bin"))
                .await
                .unwrap()
                .progress,
            50.0
        );

        // Disk still holds the pre-update state
        let reloaded = DownloadStore::load(dir.path());
        assert_eq!(
            reloaded
                .find_by_path(Path::new("/tmp/a.bin"))
                .await
                .unwrap()
                .progress,
            0.0
        );
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = tempdir().unwrap();
        let store = DownloadStore::load(dir.path());
        store.append(record("/tmp/a.bin")).await;
        store.append(record("/tmp/b.bin")).await;

        let removed = store.remove(Path::new("/tmp/a.bin")).await;
        assert_eq!(removed.unwrap().path, PathBuf::from("/tmp/a.bin"));
        assert!(store.remove(Path::new("/tmp/a.bin")).await.is_none());

        let reloaded = DownloadStore::load(dir.path());
        assert_eq!(reloaded.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_url_returns_first_match() {
        let dir = tempdir().unwrap();
        let store = DownloadStore::load(dir.path());
        store.append(record("/tmp/a.bin")).await;
        store.append(record("/tmp/b.bin")).await;

        let found = store.find_by_url("https://example.com/a.bin").await;
        assert_eq!(found.unwrap().path, PathBuf::from("/tmp/a.bin"));
        assert!(store.find_by_url("https://example.com/other").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), b"{ not json").unwrap();

        let store = DownloadStore::load(dir.path());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = DownloadStore::load(dir.path());
        assert!(store.list().await.is_empty());
        assert!(store.find_by_path(Path::new("/tmp/a.bin")).await.is_none());
    }
}
