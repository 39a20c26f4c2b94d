//! Path-level filesystem operations over storage sessions.
//!
//! [`ScriptFs`] holds no file state of its own. Each operation checks that
//! the device is still connected, opens a [`Session`], works on it and
//! closes it, so the device is written at most once per operation and only
//! when a file changed. An error anywhere inside the session drops it and
//! leaves the device untouched.
//!
//! Paths are absolute paths inside the mount (`/`, `/hello.py`).

use crate::buffer::ContentBuffer;
use crate::config::NAME_MAX;
use crate::error::{FsError, FsResult};
use crate::path::{final_segment, is_root, validate_script_path};
use numfs_core::file::display_name;
use numfs_core::{ConnectionStatus, ScriptFile, Session, Transport};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// Result of [`ScriptFs::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: EntryKind,
    /// Size in bytes of the UTF-8 content (0 for the root).
    pub size: u64,
}

impl Stat {
    pub fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    pub fn file(file: &ScriptFile) -> Self {
        Self {
            kind: EntryKind::File,
            size: file.size(),
        }
    }
}

/// Result of [`ScriptFs::statfs`]. Sizes are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub files: u64,
    pub block_size: u32,
    pub name_max: u32,
}

/// Script filesystem over a device transport.
pub struct ScriptFs<T: Transport> {
    transport: Arc<T>,
    name_max: u32,
}

impl<T: Transport> ScriptFs<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            name_max: NAME_MAX,
        }
    }

    /// Overrides the maximum name length reported by statfs.
    #[must_use]
    pub fn with_name_max(mut self, name_max: u32) -> Self {
        self.name_max = name_max;
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Fails with [`FsError::Disconnected`] unless the device is connected.
    pub async fn ensure_connected(&self) -> FsResult<()> {
        match self.transport.connection_status().await {
            ConnectionStatus::Connected => Ok(()),
            ConnectionStatus::Disconnected => {
                error!("Device is not connected anymore");
                Err(FsError::Disconnected)
            }
        }
    }

    /// Fails with [`FsError::TooLarge`] if `length` bytes exceed device storage.
    async fn ensure_fits(&self, path: &str, length: Option<u64>) -> FsResult<()> {
        let capacity = self.transport.platform_info().await?.storage_size;
        match length {
            Some(length) if length <= capacity => Ok(()),
            _ => Err(FsError::TooLarge(format!(
                "{path}: exceeds device storage of {capacity} bytes"
            ))),
        }
    }

    /// Runs `op` inside a session, closing it only if `op` succeeded.
    async fn with_session<R, F>(&self, op: F) -> FsResult<R>
    where
        F: FnOnce(&mut Session<'_, T>) -> FsResult<R>,
    {
        let mut session = Session::open(self.transport.as_ref()).await?;
        let out = op(&mut session)?;
        session.close().await?;
        Ok(out)
    }

    /// Lists the root directory: `.`, `..`, then every script.
    pub async fn list_directory(&self, path: &str) -> FsResult<Vec<String>> {
        self.ensure_connected().await?;
        if !is_root(path) {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        self.with_session(|session| {
            let mut entries = vec![".".to_string(), "..".to_string()];
            entries.extend(session.list_files().iter().map(ScriptFile::display_name));
            Ok(entries)
        })
        .await
    }

    /// Reads up to `size` bytes of the file's content starting at byte `offset`.
    pub async fn read(&self, path: &str, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        self.ensure_connected().await?;
        let name = final_segment(path);
        // An offset beyond usize is past the end of any file
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        self.with_session(|session| {
            let file = session
                .get_file(name)
                .ok_or_else(|| FsError::NotFound(name.to_string()))?;
            Ok(ContentBuffer::new(&file.content).read(offset, size).to_vec())
        })
        .await
    }

    pub async fn stat(&self, path: &str) -> FsResult<Stat> {
        self.ensure_connected().await?;
        if is_root(path) {
            return Ok(Stat::directory());
        }
        let name = final_segment(path);
        self.with_session(|session| {
            session
                .get_file(name)
                .map(Stat::file)
                .ok_or_else(|| FsError::NotFound(name.to_string()))
        })
        .await
    }

    /// Creates an empty script. Creating an existing script reports it as is.
    pub async fn create(&self, path: &str) -> FsResult<Stat> {
        self.ensure_connected().await?;
        let name = validate_script_path(path)?;
        self.with_session(|session| {
            let display_str = display_name(name);
            if let Some(existing) = session.get_file(&display_str) {
                debug!(name = %display_str, "Create on existing file");
                return Ok(Stat::file(existing));
            }
            let file = ScriptFile::empty(name);
            let stat = Stat::file(&file);
            session.append_file(file);
            info!(name = %display_str, "Created file");
            Ok(stat)
        })
        .await
    }

    /// Writes `data` at byte `offset`, creating the file if needed.
    ///
    /// A write ending past device capacity is rejected before any transfer.
    /// Returns the number of bytes written.
    pub async fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<usize> {
        self.ensure_connected().await?;
        let name = validate_script_path(path)?;
        if !data.is_empty() {
            let end = u64::try_from(data.len())
                .ok()
                .and_then(|len| offset.checked_add(len));
            self.ensure_fits(path, end).await?;
        }
        let offset = to_usize(path, offset)?;
        self.with_session(|session| {
            let file = file_or_create(session, name)?;
            let mut buf = ContentBuffer::new(&file.content);
            let written = buf.write(offset, data);
            file.content = buf.into_text(name)?;
            debug!(name, offset, written, "Wrote file");
            Ok(written)
        })
        .await
    }

    /// Resizes the file to exactly `length` bytes, creating it if needed.
    ///
    /// Growing pads with NUL bytes.
    pub async fn truncate(&self, path: &str, length: u64) -> FsResult<()> {
        self.ensure_connected().await?;
        let name = validate_script_path(path)?;
        self.ensure_fits(path, Some(length)).await?;
        let length = to_usize(path, length)?;
        self.with_session(|session| {
            let file = file_or_create(session, name)?;
            let mut buf = ContentBuffer::new(&file.content);
            buf.truncate(length);
            file.content = buf.into_text(name)?;
            debug!(name, length, "Truncated file");
            Ok(())
        })
        .await
    }

    pub async fn unlink(&self, path: &str) -> FsResult<()> {
        self.ensure_connected().await?;
        let name = final_segment(path);
        self.with_session(|session| {
            session.remove_file(name)?;
            info!(name, "Removed file");
            Ok(())
        })
        .await
    }

    /// Renames a script in place. An existing target is replaced.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        self.ensure_connected().await?;
        let new_name = validate_script_path(new_path)?;
        let old_display = final_segment(old_path);
        let new_display = final_segment(new_path);
        self.with_session(|session| {
            if session.get_file(old_display).is_none() {
                return Err(FsError::NotFound(old_display.to_string()));
            }
            if old_display == new_display {
                return Ok(());
            }
            if session.get_file(new_display).is_some() {
                debug!(name = new_display, "Rename replaces existing file");
                session.remove_file(new_display)?;
            }
            let file = session
                .get_file_mut(old_display)
                .ok_or_else(|| FsError::NotFound(old_display.to_string()))?;
            file.name = new_name.to_string();
            info!(from = old_display, to = new_display, "Renamed file");
            Ok(())
        })
        .await
    }

    /// Reports device capacity minus the space used by scripts.
    pub async fn statfs(&self, path: &str) -> FsResult<FsStats> {
        self.ensure_connected().await?;
        if !is_root(path) {
            return Err(FsError::InvalidOperation(format!("{path}: statfs is only valid on the root")));
        }
        let info = self.transport.platform_info().await?;
        let (used, files) = self
            .with_session(|session| {
                let files = session.list_files();
                Ok((files.iter().map(ScriptFile::size).sum::<u64>(), files.len() as u64))
            })
            .await?;
        let free = info.storage_size.saturating_sub(used);
        Ok(FsStats {
            total: info.storage_size,
            free,
            available: free,
            files,
            block_size: 1,
            name_max: self.name_max,
        })
    }
}

/// Returns the file for record `name`, appending an empty one if absent.
fn file_or_create<'s, T: Transport>(
    session: &'s mut Session<'_, T>,
    name: &str,
) -> FsResult<&'s mut ScriptFile> {
    let display_str = display_name(name);
    if session.get_file(&display_str).is_none() {
        debug!(name = %display_str, "Creating missing file");
        session.append_file(ScriptFile::empty(name));
    }
    session
        .get_file_mut(&display_str)
        .ok_or(FsError::NotFound(display_str))
}

fn to_usize(path: &str, value: u64) -> FsResult<usize> {
    usize::try_from(value)
        .map_err(|_| FsError::InvalidOperation(format!("{path}: offset {value} out of range")))
}
