//! FUSE filesystem implementation for NumWorks scripts.
//!
//! [`NumworksFS`] translates inode-based fuser callbacks into path-level
//! [`ScriptFs`] operations, blocking on each through the async bridge. The
//! fuser session loop runs callbacks one at a time, so storage sessions
//! never overlap.

use crate::adapter::{EntryKind, ScriptFs, Stat};
use crate::async_bridge::{self, BridgeStats};
use crate::config::MountConfig;
use crate::error::{FsError, FsResult};
use crate::inode::{InodeTable, ROOT_INODE};
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyIoctl, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use numfs_core::Transport;
use std::ffi::OsStr;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::SystemTime;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, error, info, trace, warn};

/// Block size reported in file attributes.
const BLOCK_SIZE: u32 = 512;

/// Terminal attribute query issued by editors such as nano and micro.
const TCGETS: u32 = 0x5401;

/// Events that end the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountEvent {
    /// Ctrl-C or a termination signal.
    Interrupted,
    /// A callback found the device disconnected.
    Disconnected,
}

/// FUSE filesystem exposing the scripts of one device.
pub struct NumworksFS<T: Transport + 'static> {
    /// Handle to tokio runtime for async operations.
    handle: Handle,
    /// Owned tokio runtime (when we create our own).
    /// Declared after handle so it drops last.
    _owned_runtime: Option<Runtime>,
    /// Statistics for async bridge operations.
    stats: Arc<BridgeStats>,
    /// Path-level operations (shared with spawned tasks).
    fs: Arc<ScriptFs<T>>,
    inodes: InodeTable,
    config: MountConfig,
    uid: u32,
    gid: u32,
    /// Timestamp reported for every entry.
    mounted_at: SystemTime,
    /// Receives [`MountEvent::Disconnected`] when the device goes away.
    events: Option<Sender<MountEvent>>,
}

impl<T: Transport + 'static> NumworksFS<T> {
    /// Creates a filesystem with its own tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(transport: T, config: MountConfig) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::with_runtime_internal(
            Arc::new(transport),
            Some(runtime),
            handle,
            config,
        ))
    }

    /// Creates a filesystem using an external tokio runtime handle.
    ///
    /// The runtime must outlive the filesystem.
    pub fn with_runtime_handle(transport: Arc<T>, handle: Handle, config: MountConfig) -> Self {
        Self::with_runtime_internal(transport, None, handle, config)
    }

    fn with_runtime_internal(
        transport: Arc<T>,
        owned_runtime: Option<Runtime>,
        handle: Handle,
        config: MountConfig,
    ) -> Self {
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        info!(
            uid = uid,
            gid = gid,
            attr_ttl_ms = config.attr_ttl.as_millis(),
            name_max = config.name_max,
            "NumworksFS initialized"
        );

        Self {
            handle,
            _owned_runtime: owned_runtime,
            stats: BridgeStats::new(),
            fs: Arc::new(ScriptFs::new(transport).with_name_max(config.name_max)),
            inodes: InodeTable::new(),
            config,
            uid,
            gid,
            mounted_at: SystemTime::now(),
            events: None,
        }
    }

    /// Reports fatal events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: Sender<MountEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn bridge_stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    /// Checks that the device is connected before mounting.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Disconnected`] if the device is not reachable.
    pub fn check_connection(&self) -> FsResult<()> {
        let fs = Arc::clone(&self.fs);
        self.exec(async move { fs.ensure_connected().await })
    }

    /// Liveness check for callbacks that never reach the adapter.
    ///
    /// # Errors
    ///
    /// Returns the errno to reply with, after reporting the failure.
    pub fn require_connection(&self, op: &str) -> Result<(), c_int> {
        self.check_connection().map_err(|e| self.report_error(op, &e))
    }

    /// Runs an adapter future to completion from a callback thread.
    fn exec<F, R>(&self, future: F) -> FsResult<R>
    where
        F: Future<Output = FsResult<R>> + Send + 'static,
        R: Send + 'static,
    {
        async_bridge::execute(&self.handle, Some(&self.stats), future)?
    }

    /// Logs `err`, sends [`MountEvent::Disconnected`] if it is fatal, and
    /// returns its errno.
    pub fn report_error(&self, op: &str, err: &FsError) -> c_int {
        if err.is_fatal() {
            error!(op, "Device disconnected, ending mount");
            if let Some(events) = &self.events {
                // Receiver is gone once the mount is already shutting down
                let _ = events.send(MountEvent::Disconnected);
            }
        } else if matches!(err, FsError::NotFound(_)) {
            trace!(op, error = %err, "Not found");
        } else {
            warn!(op, error = %err, "Operation failed");
        }
        err.to_errno()
    }

    /// Adapter path for an inode, if known.
    fn path_of(&self, ino: u64) -> Option<String> {
        if ino == ROOT_INODE {
            return Some("/".to_string());
        }
        self.inodes.name(ino).map(|name| format!("/{name}"))
    }

    /// Adapter path for `name` inside directory `parent`.
    ///
    /// Non-root parents produce a nested path, which the adapter rejects.
    fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        if parent == ROOT_INODE {
            return Some(format!("/{name}"));
        }
        self.path_of(parent).map(|p| format!("{p}/{name}"))
    }

    fn make_attr(&self, ino: u64, stat: Stat) -> FileAttr {
        match stat.kind {
            EntryKind::Directory => self.make_dir_attr(ino),
            EntryKind::File => self.make_file_attr(ino, stat.size),
        }
    }

    fn make_dir_attr(&self, inode: u64) -> FileAttr {
        FileAttr {
            ino: inode,
            size: 0,
            blocks: 0,
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind: FileType::Directory,
            perm: self.config.dir_perm,
            nlink: 2,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn make_file_attr(&self, inode: u64, size: u64) -> FileAttr {
        FileAttr {
            ino: inode,
            size,
            blocks: size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind: FileType::RegularFile,
            perm: self.config.file_perm,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Stats `path` and replies with attributes for `ino`.
    fn reply_attr(&self, op: &str, ino: u64, path: String, reply: ReplyAttr) {
        let fs = Arc::clone(&self.fs);
        match self.exec(async move { fs.stat(&path).await }) {
            Ok(stat) => reply.attr(&self.config.attr_ttl, &self.make_attr(ino, stat)),
            Err(e) => reply.error(self.report_error(op, &e)),
        }
    }
}

impl<T: Transport + 'static> Filesystem for NumworksFS<T> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("FUSE filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!(
            operations = self
                .stats
                .operations_completed
                .load(std::sync::atomic::Ordering::Relaxed),
            "FUSE filesystem destroyed"
        );
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name_str) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        trace!(parent = parent, name = name_str, "lookup");

        if parent != ROOT_INODE {
            reply.error(libc::ENOENT);
            return;
        }
        let path = format!("/{name_str}");
        let fs = Arc::clone(&self.fs);
        match self.exec(async move { fs.stat(&path).await }) {
            Ok(stat) => {
                let ino = self.inodes.get_or_insert(name_str);
                reply.entry(&self.config.attr_ttl, &self.make_attr(ino, stat), 0);
            }
            Err(e) => reply.error(self.report_error("lookup", &e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        self.reply_attr("getattr", ino, path, reply);
    }

    /// Only size changes are applied; mode, owner and times are fixed.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(inode = ino, size = ?size, "setattr");
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        if let Some(length) = size {
            let fs = Arc::clone(&self.fs);
            let target = path.clone();
            if let Err(e) = self.exec(async move { fs.truncate(&target, length).await }) {
                reply.error(self.report_error("setattr", &e));
                return;
            }
        }
        self.reply_attr("setattr", ino, path, reply);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, offset = offset, size = size, "read");
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        let fs = Arc::clone(&self.fs);
        let size = size as usize;
        match self.exec(async move { fs.read(&path, size, offset).await }) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(self.report_error("read", &e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(inode = ino, offset = offset, size = data.len(), "write");
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        let fs = Arc::clone(&self.fs);
        let data = data.to_vec();
        match self.exec(async move { fs.write(&path, &data, offset).await }) {
            Ok(written) => {
                // FUSE write requests never exceed max_write, far below u32::MAX
                #[allow(clippy::cast_possible_truncation)]
                reply.written(written as u32);
            }
            Err(e) => reply.error(self.report_error("write", &e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset = offset, "readdir");
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let fs = Arc::clone(&self.fs);
        let entries = match self.exec(async move { fs.list_directory(&path).await }) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(self.report_error("readdir", &e));
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, name) in entries.iter().enumerate().skip(skip) {
            let (entry_ino, kind) = match name.as_str() {
                "." | ".." => (ROOT_INODE, FileType::Directory),
                _ => (self.inodes.get_or_insert(name), FileType::RegularFile),
            };
            // Offset of the next entry
            #[allow(clippy::cast_possible_wrap)]
            let next = (i + 1) as i64;
            if reply.add(entry_ino, next, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        let Some(name_str) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        trace!(parent = parent, name = name_str, "create");
        let Some(path) = self.child_path(parent, name_str) else {
            reply.error(libc::ENOENT);
            return;
        };
        let fs = Arc::clone(&self.fs);
        match self.exec(async move { fs.create(&path).await }) {
            Ok(stat) => {
                let ino = self.inodes.get_or_insert(name_str);
                reply.created(&self.config.attr_ttl, &self.make_attr(ino, stat), 0, 0, 0);
            }
            Err(e) => reply.error(self.report_error("create", &e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent = parent, name = ?name, "mkdir");
        if let Err(errno) = self.require_connection("mkdir") {
            reply.error(errno);
            return;
        }
        let err = FsError::InvalidOperation(format!("{}: directories are not supported", name.to_string_lossy()));
        reply.error(self.report_error("mkdir", &err));
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name_str) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        trace!(parent = parent, name = name_str, "unlink");
        let Some(path) = self.child_path(parent, name_str) else {
            reply.error(libc::ENOENT);
            return;
        };
        let fs = Arc::clone(&self.fs);
        match self.exec(async move { fs.unlink(&path).await }) {
            Ok(()) => {
                self.inodes.remove(name_str);
                reply.ok();
            }
            Err(e) => reply.error(self.report_error("unlink", &e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(name_str), Some(newname_str)) = (name.to_str(), newname.to_str()) else {
            reply.error(libc::EINVAL);
            return;
        };
        trace!(
            parent = parent,
            name = name_str,
            newparent = newparent,
            newname = newname_str,
            "rename"
        );
        let (Some(old_path), Some(new_path)) = (
            self.child_path(parent, name_str),
            self.child_path(newparent, newname_str),
        ) else {
            reply.error(libc::ENOENT);
            return;
        };
        let fs = Arc::clone(&self.fs);
        match self.exec(async move { fs.rename(&old_path, &new_path).await }) {
            Ok(()) => {
                self.inodes.rename(name_str, newname_str);
                reply.ok();
            }
            Err(e) => reply.error(self.report_error("rename", &e)),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: fuser::ReplyStatfs) {
        trace!(inode = ino, "statfs");
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let fs = Arc::clone(&self.fs);
        match self.exec(async move { fs.statfs(&path).await }) {
            Ok(stats) => reply.statfs(
                stats.total,      // Total blocks
                stats.free,       // Free blocks
                stats.available,  // Available blocks (non-root)
                stats.files,      // Total inodes
                0,                // Free inodes
                stats.block_size, // Block size
                stats.name_max,   // Max filename length
                stats.block_size, // Fragment size
            ),
            Err(e) => reply.error(self.report_error("statfs", &e)),
        }
    }

    /// Answers the terminal query some editors send before saving.
    fn ioctl(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _flags: u32,
        cmd: u32,
        _in_data: &[u8],
        _out_size: u32,
        reply: ReplyIoctl,
    ) {
        trace!(inode = ino, cmd = cmd, "ioctl");
        if let Err(errno) = self.require_connection("ioctl") {
            reply.error(errno);
            return;
        }
        if cmd == TCGETS {
            reply.ioctl(0, &[]);
        } else {
            debug!(inode = ino, cmd = cmd, "Unsupported ioctl");
            reply.error(libc::ENOTTY);
        }
    }
}
