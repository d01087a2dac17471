//! Background eviction of stale transfers.
//!
//! Runs on a fixed interval, takes one `now` snapshot per cycle, and evicts
//! every in-memory transfer older than the TTL regardless of status,
//! tearing down its subscriber channels and stored bytes. Backends without
//! expiry support (the durable blob store) are left alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::EventBroadcaster;
use crate::store::TransferStore;
use crate::vault::FileVault;

pub struct ExpirySweeper {
    store: Arc<dyn TransferStore>,
    broadcaster: Arc<EventBroadcaster>,
    vault: Arc<FileVault>,
    ttl: Duration,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn TransferStore>,
        broadcaster: Arc<EventBroadcaster>,
        vault: Arc<FileVault>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            broadcaster,
            vault,
            ttl,
            interval,
        }
    }

    /// Run the sweep loop on its own task until the token is cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.store.supports_expiry() {
                tracing::info!("Storage backend persists without TTL, sweeper idle");
                return;
            }

            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await; // immediate first tick

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Expiry sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
        })
    }

    /// One sweep cycle. Idempotent; a transfer created after the cycle's
    /// `now` snapshot can never be evicted by it.
    pub async fn sweep(&self) {
        if !self.store.supports_expiry() {
            return;
        }

        let cutoff = match chrono::Utc::now().checked_sub_signed(
            chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero()),
        ) {
            Some(cutoff) => cutoff,
            None => return,
        };

        let expired = match self.store.expired_before(cutoff).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Expiry scan failed: {}", e);
                return;
            }
        };

        for id in expired {
            if let Err(e) = self.store.remove(&id).await {
                tracing::error!("Failed to evict transfer {}: {}", id, e);
                continue;
            }
            if let Err(e) = self.vault.remove_all(&id).await {
                tracing::warn!("Failed to delete files for evicted transfer {}: {}", id, e);
            }
            self.broadcaster.close_all(&id).await;
            tracing::info!("Evicted expired transfer {}", id);
        }
    }
}
