//! Live event fan-out to transfer subscribers.
//!
//! Delivery is best-effort: no retry and no replay of missed events. The
//! one exception is the synthetic status snapshot a subscriber receives
//! immediately on subscribe. Dead channels are pruned silently, the
//! publisher never sees them.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::sync::mpsc;

use crate::transfer::{FileMeta, TransferStatus};

/// Per-subscriber buffer; a subscriber this far behind starts losing events.
const CHANNEL_CAPACITY: usize = 32;

/// Event payloads pushed to subscribers, serialized as `{"type": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Status changed (also the snapshot sent on subscribe).
    Status { status: TransferStatus },
    /// A new file was registered.
    File { file: FileMeta },
    /// Terminal: transfer completed.
    Closed,
    /// Terminal: transfer cancelled.
    Cancelled,
    /// All files were deleted by an explicit operator action.
    FilesDeleted,
}

#[derive(Default)]
pub struct EventBroadcaster {
    channels: RwLock<HashMap<String, Vec<mpsc::Sender<TransferEvent>>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber channel for a transfer and immediately
    /// queue a snapshot of its current status as the first event.
    ///
    /// Pass `None` for a transfer that no longer exists: the returned
    /// stream ends right away and nothing is registered.
    pub async fn subscribe(
        &self,
        id: &str,
        snapshot: Option<TransferStatus>,
    ) -> mpsc::Receiver<TransferEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let Some(status) = snapshot else {
            // Sender dropped here; the receiver yields nothing and closes.
            return rx;
        };

        // Queue the snapshot before the channel is visible to publishers so
        // it is always the first event the subscriber sees.
        let _ = tx.try_send(TransferEvent::Status { status });

        let mut channels = self.channels.write().await;
        channels.entry(id.to_string()).or_default().push(tx);
        rx
    }

    /// Push an event to every live subscriber of a transfer. Closed
    /// channels are removed from the set; a full channel drops this event
    /// for that subscriber only.
    pub async fn publish(&self, id: &str, event: TransferEvent) {
        let mut channels = self.channels.write().await;
        let Some(set) = channels.get_mut(id) else {
            return;
        };

        set.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if set.is_empty() {
            channels.remove(id);
        }
    }

    /// End every subscriber channel for a transfer and drop the set.
    pub async fn close_all(&self, id: &str) {
        let removed = self.channels.write().await.remove(id);
        if let Some(set) = removed {
            tracing::debug!("Closed {} subscriber channel(s) for {}", set.len(), id);
        }
    }

    /// Live subscriber count for a transfer.
    pub async fn subscriber_count(&self, id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(id)
            .map(|set| set.len())
            .unwrap_or(0)
    }
}
