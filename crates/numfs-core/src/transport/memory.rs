//! In-process transport used by tests and tooling.

use super::{ConnectionStatus, DEFAULT_STORAGE_SIZE, PlatformInfo, Transport};
use crate::error::TransportError;
use crate::record::Snapshot;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A device simulated in memory.
///
/// Counts fetches and replaces so callers can observe how many full
/// transfers an operation cost.
#[derive(Debug)]
pub struct MemoryTransport {
    snapshot: Mutex<Snapshot>,
    storage_size: u64,
    connected: AtomicBool,
    fail_replace: AtomicBool,
    fetches: AtomicU64,
    replaces: AtomicU64,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

impl MemoryTransport {
    pub fn new(snapshot: Snapshot) -> Self {
        Self::with_storage_size(snapshot, DEFAULT_STORAGE_SIZE)
    }

    pub fn with_storage_size(snapshot: Snapshot, storage_size: u64) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            storage_size,
            connected: AtomicBool::new(true),
            fail_replace: AtomicBool::new(false),
            fetches: AtomicU64::new(0),
            replaces: AtomicU64::new(0),
        }
    }

    /// Returns a copy of the current device state.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().clone()
    }

    /// Overwrites the device state without counting a replace, as another
    /// client would.
    pub fn set_snapshot(&self, snapshot: Snapshot) {
        *self.snapshot.lock() = snapshot;
    }

    /// Simulates unplugging the device.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    /// Makes subsequent replaces fail (or succeed again).
    pub fn set_fail_replace(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::Relaxed);
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn replace_count(&self) -> u64 {
        self.replaces.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch_snapshot(&self) -> Result<Snapshot, TransportError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.snapshot.lock().clone())
    }

    async fn replace_snapshot(&self, snapshot: Snapshot) -> Result<(), TransportError> {
        if self.fail_replace.load(Ordering::Relaxed) {
            return Err(TransportError::Device("install_storage rejected".to_string()));
        }
        self.replaces.fetch_add(1, Ordering::Relaxed);
        *self.snapshot.lock() = snapshot;
        Ok(())
    }

    async fn connection_status(&self) -> ConnectionStatus {
        if self.connected.load(Ordering::Relaxed) {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
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

    #[tokio::test]
    async fn test_counts_transfers() {
        let transport = MemoryTransport::default();
        transport.fetch_snapshot().await.unwrap();
        transport.fetch_snapshot().await.unwrap();
        transport.replace_snapshot(Snapshot::default()).await.unwrap();
        assert_eq!(transport.fetch_count(), 2);
        assert_eq!(transport.replace_count(), 1);
    }

    #[tokio::test]
    async fn test_set_snapshot_is_not_a_replace() {
        let transport = MemoryTransport::default();
        transport.set_snapshot(Snapshot::new(vec![Record::Script(ScriptRecord::new("a", ""))]));
        assert_eq!(transport.replace_count(), 0);
        assert_eq!(transport.fetch_snapshot().await.unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let transport = MemoryTransport::default();
        assert_eq!(transport.connection_status().await, ConnectionStatus::Connected);
        transport.disconnect();
        assert_eq!(transport.connection_status().await, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_state() {
        let transport = MemoryTransport::new(Snapshot::new(vec![Record::Script(ScriptRecord::new("keep", ""))]));
        transport.set_fail_replace(true);
        let result = transport.replace_snapshot(Snapshot::default()).await;
        assert!(matches!(result, Err(TransportError::Device(_))));
        assert_eq!(transport.snapshot().records.len(), 1);
        assert_eq!(transport.replace_count(), 0);
    }
}
