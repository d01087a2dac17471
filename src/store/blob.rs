//! Durable blob-backed transfer store.
//!
//! One JSON record per transfer at `transfers/{id}.json` under the data
//! dir, the key derived deterministically from the id. A missing record is
//! a normal outcome, not an error. Writes go through a temp file plus
//! rename, and the revision check runs under a per-id mutex so concurrent
//! read-modify-write sequences serialize instead of losing updates.
//!
//! There is no TTL here: blob-backed records persist until explicitly
//! deleted.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::TransferStore;
use crate::error::TransferError;
use crate::transfer::Transfer;

pub struct BlobStore {
    records_dir: PathBuf,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BlobStore {
    /// Open (creating if needed) the record directory under `data_dir`.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let records_dir = data_dir.into().join("transfers");
        tokio::fs::create_dir_all(&records_dir).await?;
        Ok(Self {
            records_dir,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.records_dir.join(format!("{}.json", id))
    }

    async fn write_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_record(&self, id: &str) -> Result<Option<Transfer>, TransferError> {
        match tokio::fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, id: &str, transfer: &Transfer) -> Result<(), TransferError> {
        let path = self.record_path(id);
        let tmp = self.records_dir.join(format!("{}.json.tmp", id));
        let json = serde_json::to_vec_pretty(transfer)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl TransferStore for BlobStore {
    async fn create(&self) -> Result<String, TransferError> {
        let id = Uuid::new_v4().to_string();
        let lock = self.write_lock(&id).await;
        let _guard = lock.lock().await;
        self.write_record(&id, &Transfer::open_now()).await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Transfer>, TransferError> {
        self.read_record(id).await
    }

    async fn save(&self, id: &str, mut transfer: Transfer) -> Result<(), TransferError> {
        let lock = self.write_lock(id).await;
        let _guard = lock.lock().await;

        let current = self
            .read_record(id)
            .await?
            .map(|t| t.revision)
            .unwrap_or(0);
        if transfer.revision != current {
            return Err(TransferError::SaveConflict(id.to_string()));
        }

        transfer.revision += 1;
        self.write_record(id, &transfer).await
    }

    async fn remove(&self, id: &str) -> Result<(), TransferError> {
        let lock = self.write_lock(id).await;
        let _guard = lock.lock().await;
        match tokio::fs::remove_file(self.record_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        drop(_guard);
        self.write_locks.lock().await.remove(id);
        Ok(())
    }

    async fn expired_before(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, TransferError> {
        Ok(Vec::new())
    }

    fn supports_expiry(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferStatus;

    #[tokio::test]
    async fn round_trips_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let id = store.create().await.unwrap();
        let t = store.get(&id).await.unwrap().unwrap();
        assert_eq!(t.status, TransferStatus::Open);
        assert!(t.files.is_empty());
    }

    #[tokio::test]
    async fn absent_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();

        let id = store.create().await.unwrap();
        let first = store.get(&id).await.unwrap().unwrap();
        let second = first.clone();

        store.save(&id, first).await.unwrap();
        let err = store.save(&id, second).await.unwrap_err();
        assert!(matches!(err, TransferError::SaveConflict(_)));
    }

    #[tokio::test]
    async fn never_reports_expired_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();
        store.create().await.unwrap();

        assert!(!store.supports_expiry());
        let expired = store.expired_before(Utc::now()).await.unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).await.unwrap();
        let id = store.create().await.unwrap();

        store.remove(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
        // Idempotent
        store.remove(&id).await.unwrap();
    }
}
