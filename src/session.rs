//! Transfer status transitions and their side effects.
//!
//! Legal transitions are `open → closed` and `open → cancelled`, both
//! terminal. Deleting all files is an explicit operator action, not a
//! transition: it leaves the status untouched even on a closed transfer.

use std::sync::Arc;

use crate::error::TransferError;
use crate::events::{EventBroadcaster, TransferEvent};
use crate::store::{OnMissing, TransferStore, update_transfer};
use crate::transfer::TransferStatus;
use crate::vault::FileVault;

pub struct SessionStateMachine {
    store: Arc<dyn TransferStore>,
    broadcaster: Arc<EventBroadcaster>,
    vault: Arc<FileVault>,
}

impl SessionStateMachine {
    pub fn new(
        store: Arc<dyn TransferStore>,
        broadcaster: Arc<EventBroadcaster>,
        vault: Arc<FileVault>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            vault,
        }
    }

    /// Close the transfer. Absent ids are `NotFound` (a transfer must have
    /// been created to be completed); already-terminal ones are `NotOpen`.
    pub async fn complete(&self, id: &str) -> Result<(), TransferError> {
        self.transition(id, TransferStatus::Closed, TransferEvent::Closed)
            .await
    }

    /// Cancel the transfer, symmetric to [`complete`](Self::complete).
    pub async fn cancel(&self, id: &str) -> Result<(), TransferError> {
        self.transition(id, TransferStatus::Cancelled, TransferEvent::Cancelled)
            .await
    }

    async fn transition(
        &self,
        id: &str,
        target: TransferStatus,
        terminal_event: TransferEvent,
    ) -> Result<(), TransferError> {
        update_transfer(self.store.as_ref(), id, OnMissing::Fail, |t| {
            if t.status.is_terminal() {
                return Err(TransferError::NotOpen);
            }
            t.status = target;
            Ok(())
        })
        .await?;

        tracing::info!("Transfer {} -> {}", id, target);
        self.broadcaster
            .publish(id, TransferEvent::Status { status: target })
            .await;
        self.broadcaster.publish(id, terminal_event).await;
        self.broadcaster.close_all(id).await;
        Ok(())
    }

    /// Reset `files` to empty and delete the stored bytes, leaving the
    /// status as it is. Allowed in any state, including closed.
    pub async fn delete_all_files(&self, id: &str) -> Result<(), TransferError> {
        update_transfer(self.store.as_ref(), id, OnMissing::Fail, |t| {
            t.files.clear();
            Ok(())
        })
        .await?;

        self.vault.remove_all(id).await?;
        tracing::info!("Deleted all files for transfer {}", id);
        self.broadcaster.publish(id, TransferEvent::FilesDeleted).await;
        Ok(())
    }
}
