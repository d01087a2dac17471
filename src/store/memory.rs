//! In-memory transfer store.
//!
//! A map behind a tokio RwLock; every mutation happens under the write
//! guard, so save-with-revision-check is atomic. This is the backend the
//! expiry sweeper applies to.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::TransferStore;
use crate::error::TransferError;
use crate::transfer::Transfer;

#[derive(Default)]
pub struct MemoryStore {
    transfers: RwLock<HashMap<String, Transfer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live transfers, for logging and tests.
    pub async fn len(&self) -> usize {
        self.transfers.read().await.len()
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn create(&self) -> Result<String, TransferError> {
        let id = Uuid::new_v4().to_string();
        let mut transfers = self.transfers.write().await;
        transfers.insert(id.clone(), Transfer::open_now());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Transfer>, TransferError> {
        Ok(self.transfers.read().await.get(id).cloned())
    }

    async fn save(&self, id: &str, mut transfer: Transfer) -> Result<(), TransferError> {
        let mut transfers = self.transfers.write().await;
        let current = transfers.get(id).map(|t| t.revision).unwrap_or(0);
        if transfer.revision != current {
            return Err(TransferError::SaveConflict(id.to_string()));
        }
        transfer.revision += 1;
        transfers.insert(id.to_string(), transfer);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), TransferError> {
        self.transfers.write().await.remove(id);
        Ok(())
    }

    async fn expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, TransferError> {
        let transfers = self.transfers.read().await;
        Ok(transfers
            .iter()
            .filter(|(_, t)| t.created_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn supports_expiry(&self) -> bool {
        true
    }
}
