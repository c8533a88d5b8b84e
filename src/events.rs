//! Record-changed event broadcasting
//!
//! The canonical state lives in the store; events are refresh hints for
//! attached UIs. Every subscriber gets an independent bounded buffer, and a
//! full buffer drops the incoming event for that subscriber only, so
//! emitting never blocks the engine. Callers that must not miss a terminal
//! state re-read the store after reconnecting.

use crate::record::DownloadRecord;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Events buffered per subscriber before overflow starts dropping.
const SUBSCRIBER_BUFFER: usize = 64;

/// Lossy multi-subscriber broadcast of download records.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<DownloadRecord>>>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber. Dropping the returned receiver detaches it on
    /// the next emit.
    pub async fn subscribe(&self) -> mpsc::Receiver<DownloadRecord> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// Broadcast `record` to every subscriber. A subscriber whose buffer is
    /// full misses this event; a closed subscriber is removed.
    pub async fn emit(&self, record: &DownloadRecord) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|tx| match tx.try_send(record.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!(
                    "Event buffer full, dropping event for {}",
                    record.path.display()
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Number of attached subscribers, counting ones not yet pruned.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}
