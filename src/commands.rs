//! Tauri commands for download management
//!
//! Thin adapters from the host bridge to the engine: parse and validate
//! the raw arguments, delegate, and map errors to strings for the UI.
//! Progress and state changes are not returned here; they arrive on the
//! `download:changed` event channel.

use crate::engine::DownloadEngine;
use crate::record::{ActionResponse, DownloadRecord};
use crate::validate;
use tauri::State;

/// List all persisted downloads.
#[tauri::command]
pub async fn list_downloads(
    engine: State<'_, DownloadEngine>,
) -> Result<Vec<DownloadRecord>, String> {
    Ok(engine.list().await)
}

/// Get the download for `path`.
///
/// Returns a synthetic `pending` record when no download exists, so the
/// UI can render an enqueue affordance without a second call.
#[tauri::command]
pub async fn get_download(
    path: String,
    engine: State<'_, DownloadEngine>,
) -> Result<DownloadRecord, String> {
    let path = validate::parse_path(&path).map_err(|e| e.to_string())?;
    Ok(engine.get(&path).await)
}

/// Register a download of `url` to `path`.
///
/// Idempotent: an existing record for `path` is returned unchanged.
#[tauri::command]
pub async fn create_download(
    path: String,
    url: String,
    engine: State<'_, DownloadEngine>,
) -> Result<ActionResponse, String> {
    let path = validate::parse_path(&path).map_err(|e| e.to_string())?;
    let url = validate::parse_url(&url).map_err(|e| e.to_string())?;
    Ok(engine.create(&path, url.as_str()).await)
}

/// Start an idle download.
#[tauri::command]
pub async fn start_download(
    path: String,
    engine: State<'_, DownloadEngine>,
) -> Result<ActionResponse, String> {
    let path = validate::parse_path(&path).map_err(|e| e.to_string())?;
    engine.start(&path).await.map_err(|e| e.to_string())
}

/// Pause an active download, keeping the partial file for later resume.
#[tauri::command]
pub async fn pause_download(
    path: String,
    engine: State<'_, DownloadEngine>,
) -> Result<ActionResponse, String> {
    let path = validate::parse_path(&path).map_err(|e| e.to_string())?;
    engine.pause(&path).await.map_err(|e| e.to_string())
}

/// Resume a paused download from where it left off.
#[tauri::command]
pub async fn resume_download(
    path: String,
    engine: State<'_, DownloadEngine>,
) -> Result<ActionResponse, String> {
    let path = validate::parse_path(&path).map_err(|e| e.to_string())?;
    engine.resume(&path).await.map_err(|e| e.to_string())
}

/// Cancel a download and clean up its partial file.
#[tauri::command]
pub async fn cancel_download(
    path: String,
    engine: State<'_, DownloadEngine>,
) -> Result<ActionResponse, String> {
    let path = validate::parse_path(&path).map_err(|e| e.to_string())?;
    engine.cancel(&path).await.map_err(|e| e.to_string())
}
