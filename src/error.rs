//! Error taxonomy shared by the store, registry, and session layers.
//!
//! The HTTP layer owns the mapping to status codes; nothing here panics or
//! crashes the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Unknown transfer id.
    #[error("transfer not found")]
    NotFound,

    /// Mutating action on a closed or cancelled transfer.
    #[error("transfer is closed or cancelled")]
    NotOpen,

    /// Oversized or disallowed upload, rejected at the boundary.
    #[error("upload rejected: {0}")]
    PayloadRejected(String),

    /// Save raced another writer: the record's revision no longer matches.
    /// Callers reload and retry; surfaced only when retries are exhausted.
    #[error("concurrent update conflict on transfer {0}")]
    SaveConflict(String),

    /// Backend read/write failure.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// A persisted record could not be decoded.
    #[error("corrupt transfer record: {0}")]
    Codec(#[from] serde_json::Error),
}

impl TransferError {
    /// True for failures of the backend rather than of the request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            TransferError::SaveConflict(_) | TransferError::Storage(_) | TransferError::Codec(_)
        )
    }
}
