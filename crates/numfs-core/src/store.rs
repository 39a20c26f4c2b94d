//! Load/mutate/save sessions over the device storage.
//!
//! A [`Session`] loads a snapshot, exposes its scripts for mutation and, on
//! [`close`](Session::close), writes back only if the files differ by value
//! from what was loaded. A session that is dropped without being closed
//! (typically because an error was propagated with `?`) never saves.
//!
//! Saving does not trust the loaded snapshot: the current device state is
//! fetched again and the session's changes are merged into it by name, so
//! records this crate does not manage are never lost.
//!
//! ```ignore
//! let mut session = Session::open(&transport).await?;
//! let file = session.get_file_mut("hello.py").ok_or(...)?;
//! file.content.push_str("\nprint('bye')");
//! session.close().await?; // saves: content changed
//! ```

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::file::ScriptFile;
use crate::record::{Record, Snapshot};
use crate::transport::Transport;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// A scoped view of the device storage.
pub struct Session<'t, T: Transport + ?Sized> {
    transport: &'t T,
    files: Vec<ScriptFile>,
    /// Copy of `files` as loaded; never mutated until the next load or save.
    baseline: Vec<ScriptFile>,
    closed: bool,
}

impl<'t, T: Transport + ?Sized> Session<'t, T> {
    /// Opens a session, loading the current device state.
    pub async fn open(transport: &'t T) -> StoreResult<Self> {
        let mut session = Self {
            transport,
            files: Vec::new(),
            baseline: Vec::new(),
            closed: false,
        };
        session.load().await?;
        Ok(session)
    }

    /// Replaces the session state with the current device state.
    ///
    /// Uncommitted changes are discarded.
    pub async fn load(&mut self) -> StoreResult<()> {
        let snapshot = self.transport.fetch_snapshot().await?;
        let decoded = codec::decode(&snapshot)?;
        debug!(
            files = decoded.files.len(),
            passthrough = decoded.passthrough.len(),
            "Loaded storage"
        );
        self.baseline = decoded.files.clone();
        self.files = decoded.files;
        Ok(())
    }

    /// Files in insertion order.
    pub fn list_files(&self) -> &[ScriptFile] {
        &self.files
    }

    /// Finds a file by display name (`name.py`).
    pub fn get_file(&self, display_name: &str) -> Option<&ScriptFile> {
        self.files.iter().find(|f| f.matches(display_name))
    }

    pub fn get_file_mut(&mut self, display_name: &str) -> Option<&mut ScriptFile> {
        self.files.iter_mut().find(|f| f.matches(display_name))
    }

    /// Adds a file. The caller is responsible for display-name uniqueness.
    pub fn append_file(&mut self, file: ScriptFile) {
        self.files.push(file);
    }

    /// Removes the file with the given display name.
    pub fn remove_file(&mut self, display_name: &str) -> StoreResult<ScriptFile> {
        let pos = self
            .files
            .iter()
            .position(|f| f.matches(display_name))
            .ok_or_else(|| StoreError::NotFound(display_name.to_string()))?;
        Ok(self.files.remove(pos))
    }

    /// Whether the files differ from what was loaded.
    pub fn is_dirty(&self) -> bool {
        self.files != self.baseline
    }

    /// Merges the session's files into the current device state and writes it.
    ///
    /// Names present on the device but not in the session are deleted, names
    /// in both get their payload re-encoded, and names only in the session are
    /// appended. Non-script records are left as fetched.
    pub async fn save(&mut self) -> StoreResult<()> {
        if let Some(name) = self.duplicate_name() {
            return Err(StoreError::DuplicateName(name.to_string()));
        }

        let mut snapshot = self.transport.fetch_snapshot().await?;
        let old_names: HashSet<String> = snapshot.scripts().map(|r| r.name.clone()).collect();
        let new_names: HashSet<&str> = self.files.iter().map(|f| f.name.as_str()).collect();

        // Removed and modified, in device order
        let mut seen = HashSet::new();
        let device_order: Vec<String> = snapshot
            .scripts()
            .filter(|r| seen.insert(r.name.clone()))
            .map(|r| r.name.clone())
            .collect();
        for name in &device_order {
            if new_names.contains(name.as_str()) {
                debug!(name = %name, "Changed file");
                self.apply_modified(&mut snapshot, name);
            } else {
                debug!(name = %name, "Deleted file");
                while snapshot.remove_script(name).is_some() {}
            }
        }

        // Added, in session order
        for file in self.files.iter().filter(|f| !old_names.contains(&f.name)) {
            debug!(name = %file.name, "New file");
            snapshot.records.push(Record::Script(codec::to_record(file)));
        }

        self.transport.replace_snapshot(snapshot).await?;
        self.baseline = self.files.clone();
        Ok(())
    }

    /// Ends the session, saving only if something changed.
    ///
    /// Returns whether a save was performed.
    pub async fn close(mut self) -> StoreResult<bool> {
        self.closed = true;
        if !self.is_dirty() {
            info!("Storage session closed with no file changed, not saving");
            return Ok(false);
        }
        info!("Storage session closed with files changed, saving");
        self.save().await?;
        Ok(true)
    }

    fn apply_modified(&self, snapshot: &mut Snapshot, name: &str) {
        let Some(file) = self.files.iter().find(|f| f.name == name) else {
            return;
        };
        let code = codec::encode(file);
        for record in snapshot
            .records
            .iter_mut()
            .filter_map(Record::as_script_mut)
            .filter(|r| r.name == name)
        {
            record.code.clone_from(&code);
        }
    }

    fn duplicate_name(&self) -> Option<&str> {
        let mut names = HashSet::new();
        self.files
            .iter()
            .map(|f| f.name.as_str())
            .find(|name| !names.insert(*name))
    }
}

impl<T: Transport + ?Sized> Drop for Session<'_, T> {
    fn drop(&mut self) {
        if !self.closed && self.is_dirty() {
            warn!("Storage session left without closing, discarding uncommitted changes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ScriptRecord;
    use crate::transport::MemoryTransport;

    fn transport_with(names: &[&str]) -> MemoryTransport {
        let records = names
            .iter()
            .map(|n| Record::Script(ScriptRecord::new(*n, format!("# {n}"))))
            .collect();
        MemoryTransport::new(Snapshot::new(records))
    }

    #[tokio::test]
    async fn test_open_loads_files() {
        let transport = transport_with(&["a", "b"]);
        let session = Session::open(&transport).await.unwrap();
        assert_eq!(session.list_files().len(), 2);
        assert!(!session.is_dirty());
        assert_eq!(session.get_file("a.py").unwrap().content, "# a");
        assert!(session.get_file("a").is_none());
    }

    #[tokio::test]
    async fn test_dirtiness_is_by_value() {
        let transport = transport_with(&["a"]);
        let mut session = Session::open(&transport).await.unwrap();

        session.get_file_mut("a.py").unwrap().content.push('!');
        assert!(session.is_dirty());

        session.get_file_mut("a.py").unwrap().content.pop();
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn test_load_discards_changes() {
        let transport = transport_with(&["a"]);
        let mut session = Session::open(&transport).await.unwrap();
        session.append_file(ScriptFile::empty("b"));
        session.load().await.unwrap();
        assert_eq!(session.list_files().len(), 1);
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn test_remove_missing_file() {
        let transport = transport_with(&["a"]);
        let mut session = Session::open(&transport).await.unwrap();
        assert!(matches!(session.remove_file("zzz.py"), Err(StoreError::NotFound(_))));
        assert_eq!(session.remove_file("a.py").unwrap().name, "a");
        assert!(session.list_files().is_empty());
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_names() {
        let transport = transport_with(&[]);
        let mut session = Session::open(&transport).await.unwrap();
        session.append_file(ScriptFile::empty("twin"));
        session.append_file(ScriptFile::empty("twin"));
        let err = session.save().await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(ref n) if n == "twin"));
        assert_eq!(transport.replace_count(), 0);
    }

    #[tokio::test]
    async fn test_save_resets_baseline() {
        let transport = transport_with(&[]);
        let mut session = Session::open(&transport).await.unwrap();
        session.append_file(ScriptFile::new("n", "1"));
        session.save().await.unwrap();
        assert!(!session.is_dirty());
    }
}
