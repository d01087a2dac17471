//! Transfer session data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a transfer session.
///
/// Expiry never shows up here: an expired transfer is evicted outright and a
/// lookup afterwards simply finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Open,
    Closed,
    Cancelled,
}

impl TransferStatus {
    /// Closed and cancelled are terminal: no further transition is legal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Closed | TransferStatus::Cancelled)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferStatus::Open => "open",
            TransferStatus::Closed => "closed",
            TransferStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Metadata for one uploaded file, recorded when the upload is registered.
///
/// Names are taken as the upload layer reports them and are not guaranteed
/// unique within a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    pub mimetype: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
}

/// One file-sharing session, addressed by an opaque id held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub status: TransferStatus,
    pub files: Vec<FileMeta>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency token: number of saves applied to this record.
    /// `TransferStore::save` rejects a record whose revision does not match
    /// the stored one, so read-modify-write sequences cannot lose updates.
    #[serde(default)]
    pub revision: u64,
}

impl Transfer {
    /// Fresh open transfer created now, no files, revision zero.
    pub fn open_now() -> Self {
        Self {
            status: TransferStatus::Open,
            files: Vec::new(),
            created_at: Utc::now(),
            revision: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TransferStatus::Open
    }
}
