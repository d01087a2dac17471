//! QR-linked file drop from a phone to this machine.
//!
//! The desktop opens `/receive`, which creates a transfer session and shows
//! a QR code. The phone scans it, lands on the upload page, and posts PDF
//! or XLSX files. The desktop follows progress over server-sent events
//! until the transfer closes, is cancelled, or expires.

pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod http;
pub mod registry;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod transfer;
pub mod vault;

pub use config::ServerConfig;
pub use error::TransferError;
pub use http::{AppState, create_router, serve};
