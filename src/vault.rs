//! Uploaded file bytes on disk, keyed `files/{id}/{name}`.
//!
//! The registry only forwards a content stream here; nothing above the
//! multipart layer's own chunk is ever buffered.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::TransferError;

pub struct FileVault {
    files_dir: PathBuf,
}

impl FileVault {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            files_dir: data_dir.into().join("files"),
        }
    }

    /// Reduce an uploaded name to its final path component so a crafted
    /// filename cannot escape the transfer's directory.
    pub fn sanitize_name(raw: &str) -> String {
        Path::new(raw)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed.bin".to_string())
    }

    /// Open a writer for one incoming file. The caller feeds it multipart
    /// chunks and finishes with [`FileWriter::finish`].
    pub async fn writer(&self, transfer_id: &str, name: &str) -> Result<FileWriter, TransferError> {
        let dir = self.files_dir.join(transfer_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(Self::sanitize_name(name));
        let file = File::create(&path).await?;
        Ok(FileWriter {
            file,
            path,
            written: 0,
        })
    }

    /// Delete every stored file for a transfer. Missing directories are
    /// fine, the transfer may never have received an upload.
    pub async fn remove_all(&self, transfer_id: &str) -> Result<(), TransferError> {
        let dir = self.files_dir.join(transfer_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete one stored file, used when registration fails after the bytes
    /// already landed on disk.
    pub async fn remove(&self, transfer_id: &str, name: &str) -> Result<(), TransferError> {
        let path = self
            .files_dir
            .join(transfer_id)
            .join(Self::sanitize_name(name));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read back one stored file, `None` when it does not exist.
    pub async fn read(
        &self,
        transfer_id: &str,
        name: &str,
    ) -> Result<Option<Vec<u8>>, TransferError> {
        let path = self
            .files_dir
            .join(transfer_id)
            .join(Self::sanitize_name(name));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Streaming writer for one upload.
pub struct FileWriter {
    file: File,
    path: PathBuf,
    written: u64,
}

impl FileWriter {
    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), TransferError> {
        self.file.write_all(&chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and return the byte count written.
    pub async fn finish(mut self) -> Result<u64, TransferError> {
        self.file.flush().await?;
        Ok(self.written)
    }

    /// Drop the partial file after a failed upload.
    pub async fn discard(self) -> Result<(), TransferError> {
        drop(self.file);
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(FileVault::sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(FileVault::sanitize_name("report.pdf"), "report.pdf");
        assert_eq!(FileVault::sanitize_name("/"), "unnamed.bin");
    }

    #[tokio::test]
    async fn writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FileVault::new(dir.path());

        let mut w = vault.writer("t1", "a.pdf").await.unwrap();
        w.write_chunk(Bytes::from_static(b"hello ")).await.unwrap();
        w.write_chunk(Bytes::from_static(b"world")).await.unwrap();
        let written = w.finish().await.unwrap();
        assert_eq!(written, 11);

        let bytes = vault.read("t1", "a.pdf").await.unwrap().unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn remove_all_clears_the_transfer_dir() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FileVault::new(dir.path());

        let mut w = vault.writer("t2", "a.pdf").await.unwrap();
        w.write_chunk(Bytes::from_static(b"x")).await.unwrap();
        w.finish().await.unwrap();

        vault.remove_all("t2").await.unwrap();
        assert!(vault.read("t2", "a.pdf").await.unwrap().is_none());
        // Missing dir is fine
        vault.remove_all("t2").await.unwrap();
    }
}
