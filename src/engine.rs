//! Download engine
//!
//! The facade over the store, the event bus, and the per-path transfer
//! workers. Every mutating call follows the same shape: read the record,
//! check the transition is legal, write the store, emit the event, then
//! spawn or signal workers. Store writes always happen before the matching
//! emit, so the event sequence for a path mirrors its store history.

use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::record::{part_path, ActionResponse, DownloadRecord, DownloadStatus};
use crate::store::DownloadStore;
use crate::worker;
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// How long `shutdown` waits for each worker to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What a worker should do after reporting a progress tick.
pub(crate) enum ProgressSignal {
    /// Still `InProgress`; keep streaming.
    Continue,
    /// Paused by the user; stop and leave the partial file intact.
    Paused,
    /// Cancelled or removed; stop without touching any state.
    Stopped,
}

/// Handle to a running transfer worker.
struct WorkerHandle {
    /// Distinguishes this spawn from a replacement for the same path.
    id: u64,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Resumable multi-download engine.
///
/// Owns the persistent record store, the event bus, and one transfer
/// worker per active download, keyed by destination path. Cloning is cheap
/// and shares all state; the host app constructs one engine against its
/// data directory and every command goes through it.
#[derive(Clone)]
pub struct DownloadEngine {
    store: DownloadStore,
    events: EventBus,
    workers: Arc<Mutex<HashMap<PathBuf, WorkerHandle>>>,
    client: reqwest::Client,
    next_worker_id: Arc<AtomicU64>,
}

impl DownloadEngine {
    /// Create an engine against `data_dir`, loading persisted records and
    /// repairing any left `InProgress` by an earlier process: back to
    /// `Idle` when nothing was transferred, `Paused` otherwise. A transfer
    /// that was mid-flight when the process died never restarts on its own;
    /// the caller must start it again.
    pub async fn new(data_dir: &Path) -> Self {
        let store = DownloadStore::load(data_dir);

        // Configure client for large downloads:
        // - No overall timeout (downloads can take hours)
        // - 30s connect timeout, 30s idle-read timeout
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let engine = Self {
            store,
            events: EventBus::new(),
            workers: Arc::new(Mutex::new(HashMap::new())),
            client,
            next_worker_id: Arc::new(AtomicU64::new(0)),
        };
        engine.reconcile().await;
        engine
    }

    /// Snapshot of all persisted records.
    pub async fn list(&self) -> Vec<DownloadRecord> {
        self.store.list().await
    }

    /// Record for `path`, or a synthetic `Pending` record when none exists.
    pub async fn get(&self, path: &Path) -> DownloadRecord {
        match self.store.find_by_path(path).await {
            Some(record) => record,
            None => DownloadRecord::pending(path),
        }
    }

    /// Register a download for `path`. Returns the existing record
    /// unchanged when one is already present.
    pub async fn create(&self, path: &Path, url: &str) -> ActionResponse {
        if let Some(existing) = self.store.find_by_path(path).await {
            return ActionResponse::new(existing, DownloadStatus::Idle);
        }

        let record = DownloadRecord::new(url, path);
        self.store.append(record.clone()).await;
        self.events.emit(&record).await;
        info!("Created download {url} -> {}", path.display());
        ActionResponse::new(record, DownloadStatus::Idle)
    }

    /// Start transferring an `Idle` download. Any other current status is
    /// a no-op response.
    pub async fn start(&self, path: &Path) -> Result<ActionResponse> {
        self.begin_transfer(path, DownloadStatus::Idle).await
    }

    /// Resume a `Paused` download from its partial file. Any other current
    /// status is a no-op response.
    pub async fn resume(&self, path: &Path) -> Result<ActionResponse> {
        self.begin_transfer(path, DownloadStatus::Paused).await
    }

    /// Pause an `InProgress` download, keeping `<path>.download` for a
    /// later resume.
    pub async fn pause(&self, path: &Path) -> Result<ActionResponse> {
        let record = self
            .store
            .find_by_path(path)
            .await
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        if record.status != DownloadStatus::InProgress {
            return Ok(ActionResponse::new(record, DownloadStatus::Paused));
        }

        let record = record.with_status(DownloadStatus::Paused);
        self.store.update(record.clone(), true).await;
        self.events.emit(&record).await;
        // The stored status must already be Paused when the worker is told
        // to stop, so a worker that polls the record first still classifies
        // this as a pause rather than an abort.
        self.signal_worker(path).await;
        info!("Download paused: {}", path.display());
        Ok(ActionResponse::new(record, DownloadStatus::Paused))
    }

    /// Cancel a download: stop its worker, delete the partial file, and
    /// remove the record. The emitted record carries `Cancelled` even
    /// though it is no longer stored.
    pub async fn cancel(&self, path: &Path) -> Result<ActionResponse> {
        let record = self
            .store
            .find_by_path(path)
            .await
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        if !matches!(
            record.status,
            DownloadStatus::Idle | DownloadStatus::InProgress | DownloadStatus::Paused
        ) {
            return Ok(ActionResponse::new(record, DownloadStatus::Cancelled));
        }

        // Signal before deleting so the worker stops writing first; a file
        // handle briefly outliving the delete is tolerated.
        self.signal_worker(path).await;
        Self::remove_part_file(path);
        self.store.remove(path).await;

        let record = record.with_status(DownloadStatus::Cancelled);
        self.events.emit(&record).await;
        info!("Download cancelled: {}", path.display());
        Ok(ActionResponse::new(record, DownloadStatus::Cancelled))
    }

    /// Attach a subscriber to the record-changed event stream. The stream
    /// is lossy; read the store for authoritative state.
    pub async fn subscribe(&self) -> mpsc::Receiver<DownloadRecord> {
        self.events.subscribe().await
    }

    /// Signal every live worker and wait briefly for each to exit.
    pub async fn shutdown(&self) {
        let handles: Vec<WorkerHandle> = {
            let mut workers = self.workers.lock().await;
            workers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.stop_tx.send(true);
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle.task).await;
        }
    }

    // ---- shared transition plumbing ----

    async fn begin_transfer(&self, path: &Path, from: DownloadStatus) -> Result<ActionResponse> {
        let record = self
            .store
            .find_by_path(path)
            .await
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        if record.status != from {
            return Ok(ActionResponse::new(record, DownloadStatus::InProgress));
        }

        let record = record.with_status(DownloadStatus::InProgress);
        self.store.update(record.clone(), true).await;
        self.events.emit(&record).await;
        self.spawn_worker(&record).await;
        Ok(ActionResponse::new(record, DownloadStatus::InProgress))
    }

    async fn spawn_worker(&self, record: &DownloadRecord) {
        let mut workers = self.workers.lock().await;
        if let Some(prior) = workers.remove(&record.path) {
            // At most one worker per path: a restart replaces any worker
            // still running.
            let _ = prior.stop_tx.send(true);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(worker::run(
            self.clone(),
            record.url.clone(),
            record.path.clone(),
            id,
            stop_rx,
        ));
        workers.insert(record.path.clone(), WorkerHandle { id, stop_tx, task });
    }

    async fn signal_worker(&self, path: &Path) {
        let mut workers = self.workers.lock().await;
        if let Some(handle) = workers.remove(path) {
            let _ = handle.stop_tx.send(true);
        }
    }

    fn remove_part_file(path: &Path) {
        let temp = part_path(path);
        if temp.exists() {
            if let Err(e) = std::fs::remove_file(&temp) {
                warn!("Failed to remove partial file {}: {e}", temp.display());
            }
        }
    }

    #[allow(clippy::float_cmp)] // Zero progress is stored exactly
    async fn reconcile(&self) {
        let mut changed = false;
        for record in self.store.list().await {
            if record.status == DownloadStatus::InProgress {
                let status = if record.progress == 0.0 {
                    DownloadStatus::Idle
                } else {
                    DownloadStatus::Paused
                };
                info!(
                    "Reconciling stale download {}: inProgress -> {status:?}",
                    record.path.display()
                );
                self.store.update(record.with_status(status), false).await;
                changed = true;
            }
        }
        if changed {
            self.store.flush().await;
        }
    }

    // ---- worker callbacks ----

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Re-record and re-emit the `InProgress` transition once the worker
    /// has a validated response. Skipped if the user already paused or
    /// cancelled in the meantime.
    pub(crate) async fn mark_transfer_started(&self, path: &Path) {
        if let Some(record) = self.store.find_by_path(path).await {
            if record.status == DownloadStatus::InProgress {
                self.store.update(record.clone(), true).await;
                self.events.emit(&record).await;
            }
        }
    }

    /// Record a progress tick (memory-only) and tell the worker how to
    /// proceed based on the record's current status.
    pub(crate) async fn record_progress(&self, path: &Path, progress: f64) -> ProgressSignal {
        match self.store.find_by_path(path).await {
            Some(record) if record.status == DownloadStatus::InProgress => {
                let record = record.with_progress(progress);
                self.store.update(record.clone(), false).await;
                self.events.emit(&record).await;
                ProgressSignal::Continue
            }
            Some(record) if record.status == DownloadStatus::Paused => ProgressSignal::Paused,
            _ => ProgressSignal::Stopped,
        }
    }

    /// Commit a finished transfer: rename the partial file over the
    /// destination, drop the record, and emit `Completed`. If the record
    /// was paused or removed while the last bytes were in flight, the
    /// partial file is left alone and nothing is emitted.
    pub(crate) async fn finish_transfer(&self, path: &Path, temp: &Path) -> Result<()> {
        let Some(record) = self.store.find_by_path(path).await else {
            return Ok(());
        };
        if record.status != DownloadStatus::InProgress {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::transfer(format!("Failed to create directory: {e}")))?;
        }
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                Error::transfer(format!("Failed to replace {}: {e}", path.display()))
            })?;
        }
        std::fs::rename(temp, path).map_err(|e| Error::transfer(format!("Rename failed: {e}")))?;

        self.store.remove(path).await;
        let record = record.with_status(DownloadStatus::Completed);
        self.events.emit(&record).await;
        info!("Download completed: {}", path.display());
        Ok(())
    }

    /// Clean up after a failed transfer: delete the partial file, drop the
    /// record, and emit `Cancelled`. The failure reason goes to the logs
    /// only; at the API surface a failed download looks user-cancelled.
    pub(crate) async fn handle_transfer_failure(&self, path: &Path) {
        Self::remove_part_file(path);
        if let Some(record) = self.store.remove(path).await {
            let record = record.with_status(DownloadStatus::Cancelled);
            self.events.emit(&record).await;
        }
    }

    /// Drop this worker's handle unless a replacement already took the
    /// slot.
    pub(crate) async fn release_worker(&self, path: &Path, worker_id: u64) {
        let mut workers = self.workers.lock().await;
        if workers.get(path).is_some_and(|handle| handle.id == worker_id) {
            workers.remove(path);
        }
    }
}
