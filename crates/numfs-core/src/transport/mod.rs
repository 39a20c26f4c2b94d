//! The device seam.
//!
//! The calculator only supports whole-collection transfers: a snapshot is
//! fetched in full and replaced in full. There is no incremental protocol,
//! and this layer imposes no timeouts of its own.

mod backup;
mod memory;

pub use backup::BackupFileTransport;
pub use memory::MemoryTransport;

use crate::error::TransportError;
use crate::record::Snapshot;
use async_trait::async_trait;

/// Storage size of a stock device, in bytes.
pub const DEFAULT_STORAGE_SIZE: u64 = 32 * 1024;

/// Link state reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Device information used for filesystem statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Total script storage, in bytes.
    pub storage_size: u64,
}

/// Access to a device's record storage.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the complete record collection.
    async fn fetch_snapshot(&self) -> Result<Snapshot, TransportError>;

    /// Atomically replaces the complete record collection.
    async fn replace_snapshot(&self, snapshot: Snapshot) -> Result<(), TransportError>;

    /// Reports whether the device is still reachable.
    async fn connection_status(&self) -> ConnectionStatus;

    /// Queries device capacity.
    async fn platform_info(&self) -> Result<PlatformInfo, TransportError>;
}
