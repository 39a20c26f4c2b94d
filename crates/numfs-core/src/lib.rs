//! Storage synchronization engine for NumWorks script storage.
//!
//! The calculator keeps its files as a flat collection of typed records that
//! can only be fetched and replaced as a whole. This crate turns that record
//! collection into a set of editable [`ScriptFile`]s and back:
//!
//! - [`record`] - the wire form of a storage snapshot
//! - [`codec`] - conversion between managed records and script files,
//!   including the payload encoding workaround
//! - [`store`] - load/mutate/save sessions with dirtiness tracking and a
//!   re-fetch-then-merge save
//! - [`transport`] - the device seam, with an in-memory and a backup-file
//!   implementation
//!
//! # Usage
//!
//! ```ignore
//! use numfs_core::{MemoryTransport, Session};
//!
//! let transport = MemoryTransport::default();
//! let mut session = Session::open(&transport).await?;
//! session.append_file(ScriptFile::new("hello", "print('hi')"));
//! session.close().await?;
//! ```

pub mod codec;
pub mod error;
pub mod file;
pub mod record;
pub mod store;
pub mod transport;

pub use error::{StoreError, StoreResult, TransportError};
pub use file::{SCRIPT_EXTENSION, ScriptFile};
pub use record::{OpaqueRecord, Record, ScriptRecord, Snapshot};
pub use store::Session;
pub use transport::{
    BackupFileTransport, ConnectionStatus, DEFAULT_STORAGE_SIZE, MemoryTransport, PlatformInfo,
    Transport,
};
