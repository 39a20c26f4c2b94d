//! Error types for the storage engine.

use std::io;
use thiserror::Error;

/// Errors raised by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Local I/O failed (backup-file transport).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The snapshot could not be (de)serialized.
    #[error("Malformed storage snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// The device rejected or failed the request.
    #[error("Device error: {0}")]
    Device(String),
}

/// Errors raised by store sessions and the record codec.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No file with this display name exists in the session.
    #[error("No such file: {0}")]
    NotFound(String),

    /// Content cannot be represented losslessly in the payload encoding.
    #[error("Encoding violation in '{name}': {reason}")]
    EncodingViolation { name: String, reason: String },

    /// Two files in the session share a name; saving would drop one.
    #[error("Duplicate script name: {0}")]
    DuplicateName(String),

    /// Fetching or replacing the snapshot failed.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The device is no longer connected.
    #[error("Device disconnected")]
    Disconnected,
}

impl StoreError {
    /// Builds an [`StoreError::EncodingViolation`] for the named file.
    pub fn encoding(name: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::EncodingViolation {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts_into_store_error() {
        let io_err = io::Error::other("usb stall");
        let err: StoreError = TransportError::from(io_err).into();
        assert!(matches!(err, StoreError::Transport(TransportError::Io(_))));
        assert!(err.to_string().contains("usb stall"));
    }

    #[test]
    fn test_encoding_violation_display() {
        let err = StoreError::encoding("main", "invalid utf-8 sequence");
        let display = err.to_string();
        assert!(display.contains("'main'"));
        assert!(display.contains("invalid utf-8 sequence"));
    }

    #[test]
    fn test_not_found_display() {
        let err = StoreError::NotFound("ghost.py".to_string());
        assert_eq!(err.to_string(), "No such file: ghost.py");
    }
}
