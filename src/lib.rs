//! Resumable download engine for Tauri apps
//!
//! Accepts, persists, runs, pauses, resumes and cancels HTTP(S) downloads
//! to caller-chosen absolute paths, surviving process restarts:
//!
//! - Records are journaled to `downloads.json` in the app data directory;
//!   a restart finds interrupted downloads parked as `idle` or `paused`.
//! - Transfers stream into `<path>.download` and are renamed into place on
//!   completion, so a crash never leaves a half-written destination file.
//! - Paused and interrupted transfers resume with an HTTP `Range` request
//!   sized by the partial file.
//! - Every record change is re-emitted to the UI on the
//!   [`CHANGED_EVENT`] channel.
//!
//! Host apps register the plugin via [`init`]; the engine itself
//! ([`DownloadEngine`]) is also usable directly, which is how the
//! integration tests drive it.

mod commands;
mod engine;
mod error;
mod events;
mod record;
mod store;
mod validate;
mod worker;

pub use engine::DownloadEngine;
pub use error::{Error, Result};
pub use record::{part_path, ActionResponse, DownloadRecord, DownloadStatus, PART_SUFFIX};
pub use store::{DownloadStore, STORE_FILE};
pub use validate::{parse_path, parse_url};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Emitter, Manager, Runtime,
};

/// Event channel on which changed records reach the host UI.
pub const CHANGED_EVENT: &str = "download:changed";

/// Initialize the download plugin.
///
/// Builds the engine against the app's data directory, registers the
/// command handlers, and forwards every engine event to [`CHANGED_EVENT`].
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("download")
        .invoke_handler(tauri::generate_handler![
            commands::list_downloads,
            commands::get_download,
            commands::create_download,
            commands::start_download,
            commands::pause_download,
            commands::resume_download,
            commands::cancel_download,
        ])
        .setup(|app, _api| {
            let data_dir = app.path().app_data_dir()?;
            let engine = tauri::async_runtime::block_on(DownloadEngine::new(&data_dir));
            let mut events = tauri::async_runtime::block_on(engine.subscribe());
            app.manage(engine);

            let handle = app.clone();
            tauri::async_runtime::spawn(async move {
                while let Some(record) = events.recv().await {
                    if let Err(e) = handle.emit(CHANGED_EVENT, &record) {
                        log::warn!("Failed to emit download event: {e}");
                    }
                }
            });
            Ok(())
        })
        .build()
}
