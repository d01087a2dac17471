//! Server configuration from environment variables.
//!
//! Everything has a default so the binary runs with no setup; a `.env` file
//! is honored via dotenvy in main.

use std::path::PathBuf;
use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default time-to-live for an in-memory transfer (30 minutes).
pub const DEFAULT_TTL_SECS: u64 = 30 * 60;

/// Default sweep interval (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Default per-file upload ceiling (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// MIME types admitted by default: PDF and XLSX.
pub const DEFAULT_ALLOWED_MIMETYPES: [&str; 2] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Which persistence backend holds transfer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local map, swept by TTL.
    Memory,
    /// Durable JSON blobs under the data dir, no TTL sweep.
    Blob,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub max_file_size: u64,
    pub allowed_mimetypes: Vec<String>,
    pub backend: StorageBackend,
    /// Root for uploaded bytes and (blob backend) transfer records.
    pub data_dir: PathBuf,
    /// Base URL embedded in QR links; when unset the LAN address is used.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_mimetypes: DEFAULT_ALLOWED_MIMETYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("data"),
            public_url: None,
        }
    }
}

impl ServerConfig {
    /// Read config from the environment, falling back to defaults for any
    /// missing or unparseable value.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_var::<u16>("PORT") {
            cfg.port = port;
        }
        if let Some(secs) = parse_var::<u64>("TRANSFER_TTL_SECS") {
            cfg.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("SWEEP_INTERVAL_SECS") {
            cfg.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse_var::<u64>("MAX_FILE_SIZE_BYTES") {
            cfg.max_file_size = bytes;
        }
        if let Ok(list) = std::env::var("ALLOWED_MIMETYPES") {
            let types: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !types.is_empty() {
                cfg.allowed_mimetypes = types;
            }
        }
        if let Ok(backend) = std::env::var("STORAGE_BACKEND") {
            match backend.trim().to_ascii_lowercase().as_str() {
                "memory" => cfg.backend = StorageBackend::Memory,
                "blob" => cfg.backend = StorageBackend::Blob,
                other => {
                    tracing::warn!("Unknown STORAGE_BACKEND '{}', using memory", other);
                }
            }
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            if !dir.trim().is_empty() {
                cfg.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var("PUBLIC_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if !url.is_empty() {
                cfg.public_url = Some(url);
            }
        }

        cfg
    }

    /// TTL in whole seconds, reported to clients at transfer creation.
    pub fn expires_in_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    pub fn is_mimetype_allowed(&self, mimetype: &str) -> bool {
        self.allowed_mimetypes.iter().any(|m| m == mimetype)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}='{}'", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.ttl, Duration::from_secs(1800));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(300));
        assert_eq!(cfg.max_file_size, 104_857_600);
        assert_eq!(cfg.backend, StorageBackend::Memory);
    }

    #[test]
    fn pdf_and_xlsx_are_allowed_by_default() {
        let cfg = ServerConfig::default();
        assert!(cfg.is_mimetype_allowed("application/pdf"));
        assert!(cfg.is_mimetype_allowed(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        ));
        assert!(!cfg.is_mimetype_allowed("image/png"));
    }
}
