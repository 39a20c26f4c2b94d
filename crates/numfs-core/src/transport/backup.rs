//! Transport backed by a storage backup file.
//!
//! The file holds the device's backup JSON. Replacing it goes through a
//! temporary file in the same directory followed by a rename, so readers
//! never observe a partial snapshot.

use super::{ConnectionStatus, PlatformInfo, Transport};
use crate::error::TransportError;
use crate::record::Snapshot;
use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A device whose storage lives in a backup file on disk.
#[derive(Debug, Clone)]
pub struct BackupFileTransport {
    path: PathBuf,
    storage_size: u64,
}

impl BackupFileTransport {
    pub fn new(path: impl Into<PathBuf>, storage_size: u64) -> Self {
        Self {
            path: path.into(),
            storage_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl Transport for BackupFileTransport {
    async fn fetch_snapshot(&self) -> Result<Snapshot, TransportError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), records = snapshot.records.len(), "Fetched snapshot");
        Ok(snapshot)
    }

    async fn replace_snapshot(&self, snapshot: Snapshot) -> Result<(), TransportError> {
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::write_atomic(&path, &bytes))
            .await
            .map_err(|e| TransportError::Io(io::Error::other(e)))??;
        debug!(path = %self.path.display(), records = snapshot.records.len(), "Replaced snapshot");
        Ok(())
    }

    async fn connection_status(&self) -> ConnectionStatus {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => ConnectionStatus::Connected,
            _ => ConnectionStatus::Disconnected,
        }
    }

    async fn platform_info(&self) -> Result<PlatformInfo, TransportError> {
        Ok(PlatformInfo {
            storage_size: self.storage_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, ScriptRecord};
    use tempfile::TempDir;

    const BACKUP: &str = r#"{
        "magik": true,
        "records": [
            { "name": "hello", "type": "py", "autoImport": true, "code": "print(1)" },
            { "name": "exam", "type": "sys", "data": "AAEC" }
        ]
    }"#;

    fn backup_in(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("storage.json");
        std::fs::write(&path, BACKUP).unwrap();
        path
    }

    #[tokio::test]
    async fn test_fetch_parses_backup() {
        let dir = TempDir::new().unwrap();
        let transport = BackupFileTransport::new(backup_in(&dir), 1024);
        let snapshot = transport.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.scripts().count(), 1);
    }

    #[tokio::test]
    async fn test_replace_then_fetch() {
        let dir = TempDir::new().unwrap();
        let transport = BackupFileTransport::new(backup_in(&dir), 1024);

        let mut snapshot = transport.fetch_snapshot().await.unwrap();
        snapshot.records.push(Record::Script(ScriptRecord::new("new", "x = 1")));
        transport.replace_snapshot(snapshot.clone()).await.unwrap();

        let reread = transport.fetch_snapshot().await.unwrap();
        assert_eq!(reread, snapshot);
        assert_eq!(reread.header.get("magik"), Some(&serde_json::Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_connection_follows_file_presence() {
        let dir = TempDir::new().unwrap();
        let path = backup_in(&dir);
        let transport = BackupFileTransport::new(&path, 1024);
        assert_eq!(transport.connection_status().await, ConnectionStatus::Connected);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(transport.connection_status().await, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_malformed_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();
        let transport = BackupFileTransport::new(&path, 1024);
        assert!(matches!(transport.fetch_snapshot().await, Err(TransportError::Json(_))));
    }

    #[tokio::test]
    async fn test_platform_info() {
        let transport = BackupFileTransport::new("/nonexistent", 4242);
        assert_eq!(transport.platform_info().await.unwrap().storage_size, 4242);
    }
}
