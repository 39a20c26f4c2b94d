//! Error handling and mapping for the FUSE filesystem.
//!
//! Store and codec errors keep their meaning when they cross into this
//! crate; only their representation changes, to a POSIX errno at the
//! callback boundary.

use crate::async_bridge::BridgeError;
use numfs_core::{StoreError, TransportError};
use thiserror::Error;

/// Errors produced by filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path names a file that does not exist.
    #[error("No such file: {0}")]
    NotFound(String),

    /// The path violates placement or extension rules.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The path names a file where a directory is required.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// The file would not fit in device storage.
    #[error("File too large: {0}")]
    TooLarge(String),

    /// Content cannot be stored losslessly.
    #[error("Encoding violation: {0}")]
    EncodingViolation(String),

    /// Fetching or replacing the device storage failed.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The device is gone. Fatal for the whole mount.
    #[error("Device disconnected")]
    Disconnected,

    /// The async task running the operation did not complete.
    #[error("Async bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl FsError {
    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::TooLarge(_) => libc::EFBIG,
            FsError::InvalidOperation(_)
            | FsError::EncodingViolation(_)
            | FsError::Transport(_)
            | FsError::Disconnected => libc::EIO,
            FsError::Bridge(e) => e.to_errno(),
        }
    }

    /// Whether this error must end the mount.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Disconnected)
    }
}

impl From<StoreError> for FsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => FsError::NotFound(name),
            StoreError::EncodingViolation { .. } => FsError::EncodingViolation(e.to_string()),
            StoreError::DuplicateName(_) => FsError::InvalidOperation(e.to_string()),
            StoreError::Transport(t) => FsError::Transport(t),
            StoreError::Disconnected => FsError::Disconnected,
        }
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for FsError {
    fn to_errno(&self) -> i32 {
        FsError::to_errno(self)
    }
}

impl ToErrno for StoreError {
    fn to_errno(&self) -> i32 {
        match self {
            StoreError::NotFound(_) => libc::ENOENT,
            _ => libc::EIO,
        }
    }
}
