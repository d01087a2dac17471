//! File registration against a transfer session.

use std::sync::Arc;

use crate::error::TransferError;
use crate::events::{EventBroadcaster, TransferEvent};
use crate::store::{OnMissing, TransferStore, update_transfer};
use crate::transfer::FileMeta;

/// Appends validated file metadata to a transfer and notifies subscribers.
///
/// Payload validation (size ceiling, MIME allow-list) happens at the HTTP
/// boundary before this is invoked; the registry only sees metadata the
/// upload layer already accepted.
pub struct FileRegistry {
    store: Arc<dyn TransferStore>,
    broadcaster: Arc<EventBroadcaster>,
}

impl FileRegistry {
    pub fn new(store: Arc<dyn TransferStore>, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Register one uploaded file.
    ///
    /// A missing transfer is created open on the fly: the mobile client can
    /// hit the upload route before the desktop's create call has landed.
    /// An existing transfer that is no longer open fails with `NotOpen` and
    /// nothing is appended.
    pub async fn add_file(&self, id: &str, meta: FileMeta) -> Result<(), TransferError> {
        update_transfer(self.store.as_ref(), id, OnMissing::CreateOpen, |t| {
            if !t.is_open() {
                return Err(TransferError::NotOpen);
            }
            t.files.push(meta.clone());
            Ok(())
        })
        .await?;

        tracing::info!(
            "Registered {} ({} bytes, {}) on transfer {}",
            meta.name,
            meta.size,
            meta.mimetype,
            id
        );
        self.broadcaster
            .publish(id, TransferEvent::File { file: meta })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransferEvent;
    use crate::store::MemoryStore;
    use crate::transfer::TransferStatus;
    use chrono::Utc;

    fn meta(name: &str, size: u64) -> FileMeta {
        FileMeta {
            name: name.to_string(),
            size,
            mimetype: "application/pdf".to_string(),
            uploaded_at: Utc::now(),
        }
    }

    fn registry_with_store() -> (FileRegistry, Arc<MemoryStore>, Arc<EventBroadcaster>) {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(EventBroadcaster::new());
        let registry = FileRegistry::new(store.clone(), broadcaster.clone());
        (registry, store, broadcaster)
    }

    #[tokio::test]
    async fn appends_preserving_order() {
        let (registry, store, _) = registry_with_store();
        let id = store.create().await.unwrap();

        registry.add_file(&id, meta("a.pdf", 1)).await.unwrap();
        registry.add_file(&id, meta("b.pdf", 2)).await.unwrap();

        let t = store.get(&id).await.unwrap().unwrap();
        assert_eq!(t.files.len(), 2);
        assert_eq!(t.files[0].name, "a.pdf");
        assert_eq!(t.files[1].name, "b.pdf");
    }

    #[tokio::test]
    async fn duplicate_names_are_accepted() {
        let (registry, store, _) = registry_with_store();
        let id = store.create().await.unwrap();

        registry.add_file(&id, meta("scan.pdf", 1)).await.unwrap();
        registry.add_file(&id, meta("scan.pdf", 2)).await.unwrap();

        let t = store.get(&id).await.unwrap().unwrap();
        assert_eq!(t.files.len(), 2);
    }

    #[tokio::test]
    async fn creates_open_transfer_when_absent() {
        let (registry, store, _) = registry_with_store();

        registry
            .add_file("phone-won-the-race", meta("a.pdf", 1))
            .await
            .unwrap();

        let t = store.get("phone-won-the-race").await.unwrap().unwrap();
        assert_eq!(t.status, TransferStatus::Open);
        assert_eq!(t.files.len(), 1);
    }

    #[tokio::test]
    async fn rejects_closed_transfer_without_appending() {
        let (registry, store, _) = registry_with_store();
        let id = store.create().await.unwrap();

        let mut t = store.get(&id).await.unwrap().unwrap();
        t.status = TransferStatus::Closed;
        store.save(&id, t).await.unwrap();

        let err = registry.add_file(&id, meta("late.pdf", 1)).await.unwrap_err();
        assert!(matches!(err, TransferError::NotOpen));

        let t = store.get(&id).await.unwrap().unwrap();
        assert!(t.files.is_empty());
    }

    #[tokio::test]
    async fn emits_file_event_to_subscribers() {
        let (registry, store, broadcaster) = registry_with_store();
        let id = store.create().await.unwrap();
        let mut rx = broadcaster.subscribe(&id, Some(TransferStatus::Open)).await;

        registry.add_file(&id, meta("a.pdf", 42)).await.unwrap();

        // Snapshot first, then the file event.
        assert!(matches!(rx.recv().await, Some(TransferEvent::Status { .. })));
        match rx.recv().await {
            Some(TransferEvent::File { file }) => {
                assert_eq!(file.name, "a.pdf");
                assert_eq!(file.size, 42);
            }
            other => panic!("expected file event, got {:?}", other),
        }
    }
}
