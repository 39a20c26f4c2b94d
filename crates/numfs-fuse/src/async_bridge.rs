//! Bridge between sync FUSE callbacks and async storage operations.
//!
//! Transport calls are async, but a FUSE callback must not return before its
//! operation completed. Futures are spawned on the tokio runtime and the
//! callback thread blocks on a oneshot channel until the result arrives.
//! No timeout is applied here; timeouts belong to the transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Statistics for async bridge operations (for observability).
#[derive(Debug, Default)]
pub struct BridgeStats {
    pub operations_started: AtomicU64,
    pub operations_completed: AtomicU64,
    pub operations_cancelled: AtomicU64,
}

impl BridgeStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_start(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_complete(&self) {
        self.operations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.operations_cancelled.fetch_add(1, Ordering::Relaxed);
    }
}

/// Error from async bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The task was dropped before producing a result (runtime shut down or
    /// the task panicked).
    #[error("operation was cancelled")]
    Cancelled,
}

impl BridgeError {
    pub fn to_errno(&self) -> i32 {
        match self {
            BridgeError::Cancelled => libc::ECANCELED,
        }
    }
}

/// Execute an async future from sync context and wait for it.
///
/// Must not be called from a runtime worker thread.
pub fn execute<F, T>(handle: &Handle, stats: Option<&BridgeStats>, future: F) -> Result<T, BridgeError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if let Some(s) = stats {
        s.record_start();
    }

    let (tx, rx) = oneshot::channel();
    handle.spawn(async move {
        // Ignore send error - receiver only goes away with the caller
        let _ = tx.send(future.await);
    });

    if let Ok(value) = rx.blocking_recv() {
        if let Some(s) = stats {
            s.record_complete();
        }
        Ok(value)
    } else {
        if let Some(s) = stats {
            s.record_cancelled();
        }
        Err(BridgeError::Cancelled)
    }
}
