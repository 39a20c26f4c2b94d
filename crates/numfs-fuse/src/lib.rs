//! FUSE filesystem for NumWorks calculator scripts.
//!
//! Mounts the calculator's Python scripts as a single flat directory of
//! `.py` files. Every filesystem call opens a storage session, applies its
//! change, and writes the device storage back only if a file actually
//! changed.
//!
//! # Layers
//!
//! - [`adapter::ScriptFs`] - path-level operations over storage sessions
//! - [`filesystem::NumworksFS`] - the fuser binding (inodes, attributes,
//!   errno replies)
//!
//! # Usage
//!
//! ```ignore
//! use numfs_core::BackupFileTransport;
//! use numfs_fuse::{MountConfig, NumworksFS};
//!
//! let transport = BackupFileTransport::new("storage.json", 32 * 1024);
//! let fs = NumworksFS::new(transport, MountConfig::default())?;
//! fuser::mount2(fs, mountpoint, &MountConfig::default().mount_options())?;
//! ```

pub mod adapter;
pub mod async_bridge;
pub mod buffer;
pub mod config;
pub mod daemon;
pub mod error;
pub mod filesystem;
pub mod inode;
pub mod path;

pub use adapter::{EntryKind, FsStats, ScriptFs, Stat};
pub use config::MountConfig;
pub use error::{FsError, FsResult, ToErrno};
pub use filesystem::{MountEvent, NumworksFS};
pub use inode::{InodeTable, ROOT_INODE};
