//! Transfer persistence abstraction.
//!
//! Two backends implement the same contract: a process-local map swept by
//! TTL and a durable JSON-blob directory with no expiry. Callers observe
//! identical behavior through `create`/`get`/`save`; the only advertised
//! difference is the `supports_expiry` capability flag.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TransferError;
use crate::transfer::Transfer;

mod blob;
mod memory;

pub use blob::BlobStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Allocate a fresh id and store an open, empty transfer under it.
    async fn create(&self) -> Result<String, TransferError>;

    /// Fetch the current record. Absent ids are `Ok(None)`, never an error.
    async fn get(&self, id: &str) -> Result<Option<Transfer>, TransferError>;

    /// Persist the full record. The record's `revision` must match the
    /// stored one (zero for a not-yet-stored id) or `SaveConflict` is
    /// returned; on success the stored revision is bumped by one.
    async fn save(&self, id: &str, transfer: Transfer) -> Result<(), TransferError>;

    /// Delete the whole record. Unknown ids are a no-op.
    async fn remove(&self, id: &str) -> Result<(), TransferError>;

    /// Ids of transfers created strictly before `cutoff`. Always empty for
    /// backends that do not support expiry.
    async fn expired_before(&self, cutoff: DateTime<Utc>)
    -> Result<Vec<String>, TransferError>;

    /// Whether the sweeper may evict records from this backend.
    fn supports_expiry(&self) -> bool;
}

/// What to do when the id being updated has no record.
#[derive(Debug, Clone, Copy)]
pub enum OnMissing {
    /// Fail with `NotFound`.
    Fail,
    /// Start from a fresh open transfer. Used where the mobile client may
    /// race the desktop's create call.
    CreateOpen,
}

/// Bounded number of reload-and-retry rounds before a conflict surfaces.
const MAX_SAVE_ATTEMPTS: u32 = 5;

/// Load, mutate, and save a transfer with conflict retries, so a logical
/// read-modify-write is atomic even when two callers race on the same id.
pub async fn update_transfer<F>(
    store: &dyn TransferStore,
    id: &str,
    on_missing: OnMissing,
    mut mutate: F,
) -> Result<Transfer, TransferError>
where
    F: FnMut(&mut Transfer) -> Result<(), TransferError>,
{
    for attempt in 0..MAX_SAVE_ATTEMPTS {
        let mut transfer = match store.get(id).await? {
            Some(t) => t,
            None => match on_missing {
                OnMissing::Fail => return Err(TransferError::NotFound),
                OnMissing::CreateOpen => Transfer::open_now(),
            },
        };

        mutate(&mut transfer)?;

        match store.save(id, transfer.clone()).await {
            Ok(()) => {
                transfer.revision += 1;
                return Ok(transfer);
            }
            Err(TransferError::SaveConflict(_)) => {
                tracing::debug!(
                    "Save conflict on transfer {} (attempt {}), retrying",
                    id,
                    attempt + 1
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(TransferError::SaveConflict(id.to_string()))
}
