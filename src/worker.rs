//! Transfer worker
//!
//! One worker per active download: a single streaming GET, resumed with a
//! `Range` header when `<path>.download` already holds bytes, appending
//! chunks into the partial file and renaming it over the destination on
//! success. The worker polls its stop signal after every chunk and re-reads
//! the record on every emitted progress tick, so a pause or cancel recorded
//! by the engine is observed within one chunk.

use crate::engine::{DownloadEngine, ProgressSignal};
use crate::error::{Error, Result};
use crate::record::part_path;
use futures_util::StreamExt;
use log::{error, info};
use reqwest::StatusCode;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Minimum progress gain, in percent, between emitted progress ticks.
const PROGRESS_STEP: f64 = 1.0;

/// Run one transfer attempt, routing any failure to the engine's handler.
///
/// The outcome is communicated through engine state updates and events,
/// never returned: completion removes the record and emits `Completed`, a
/// pause or cancel observed mid-stream simply stops the worker (the engine
/// already recorded the user's intent), and a failure removes the record
/// and emits `Cancelled`.
pub(crate) async fn run(
    engine: DownloadEngine,
    url: String,
    path: PathBuf,
    worker_id: u64,
    stop_rx: watch::Receiver<bool>,
) {
    if let Err(e) = transfer(&engine, &url, &path, stop_rx).await {
        error!("Download failed for {}: {e}", path.display());
        engine.handle_transfer_failure(&path).await;
    }
    engine.release_worker(&path, worker_id).await;
}

async fn transfer(
    engine: &DownloadEngine,
    url: &str,
    path: &Path,
    stop_rx: watch::Receiver<bool>,
) -> Result<()> {
    let temp = part_path(path);
    let have = std::fs::metadata(&temp).map(|m| m.len()).unwrap_or(0);

    let mut request = engine.client().get(url);
    if have > 0 {
        info!("Resuming download for {} from {have} bytes", path.display());
        request = request.header(reqwest::header::RANGE, format!("bytes={have}-"));
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::transfer(format!("Request failed: {e}")))?;

    let status = response.status();
    if have > 0 && status != StatusCode::PARTIAL_CONTENT {
        return Err(Error::transfer("Server does not support partial downloads"));
    }
    if !status.is_success() {
        return Err(Error::transfer(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown")
        )));
    }
    if status == StatusCode::NO_CONTENT {
        return Err(Error::transfer("Empty response body"));
    }

    // Size of the whole artifact; 0 when the server does not advertise a
    // length, in which case progress stays at 0 until completion.
    let total = response.content_length().map_or(0, |len| len + have);

    if let Some(parent) = temp.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::transfer(format!("Failed to create directory: {e}")))?;
    }

    engine.mark_transfer_started(path).await;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&temp)
        .map_err(|e| Error::transfer(format!("Failed to open file: {e}")))?;

    let mut downloaded = have;
    let mut last_emitted = 0.0_f64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        if *stop_rx.borrow() {
            // The engine already recorded the pause or cancel; stop writing
            // and leave all state changes to it.
            return Ok(());
        }

        let chunk = chunk.map_err(|e| Error::transfer(format!("Stream error: {e}")))?;
        file.write_all(&chunk)
            .map_err(|e| Error::transfer(format!("Write error: {e}")))?;
        downloaded += chunk.len() as u64;

        #[allow(clippy::cast_precision_loss)]
        let progress = if total == 0 {
            0.0
        } else {
            (downloaded as f64 / total as f64) * 100.0
        };
        if progress < 100.0 && progress - last_emitted <= PROGRESS_STEP {
            continue;
        }

        match engine.record_progress(path, progress).await {
            ProgressSignal::Continue => last_emitted = progress,
            ProgressSignal::Paused => {
                info!("Download paused: {}", path.display());
                return Ok(());
            }
            ProgressSignal::Stopped => return Ok(()),
        }
    }

    file.sync_all()
        .map_err(|e| Error::transfer(format!("Sync error: {e}")))?;
    drop(file);

    engine.finish_transfer(path, &temp).await
}
