//! Inode numbering for the flat script directory.
//!
//! FUSE addresses files by inode while the device addresses them by name.
//! Since the directory is flat, an inode maps to a display name directly.
//! Numbers are handed out on first sight and never reused, and survive a
//! rename.

use std::collections::HashMap;

/// The root inode number (always 1 in FUSE).
pub const ROOT_INODE: u64 = 1;

/// Bidirectional map between inode numbers and display names.
#[derive(Debug)]
pub struct InodeTable {
    by_name: HashMap<String, u64>,
    by_inode: HashMap<u64, String>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_inode: HashMap::new(),
            next_inode: ROOT_INODE + 1,
        }
    }

    /// Returns the inode for `name`, allocating one if needed.
    pub fn get_or_insert(&mut self, name: &str) -> u64 {
        if let Some(&ino) = self.by_name.get(name) {
            return ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.by_name.insert(name.to_string(), ino);
        self.by_inode.insert(ino, name.to_string());
        ino
    }

    pub fn inode(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, ino: u64) -> Option<&str> {
        self.by_inode.get(&ino).map(String::as_str)
    }

    /// Drops the mapping for `name`.
    pub fn remove(&mut self, name: &str) -> Option<u64> {
        let ino = self.by_name.remove(name)?;
        self.by_inode.remove(&ino);
        Some(ino)
    }

    /// Moves `from`'s inode to `to`. A previous inode for `to` is dropped.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.remove(to);
        if let Some(ino) = self.by_name.remove(from) {
            self.by_name.insert(to.to_string(), ino);
            self.by_inode.insert(ino, to.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_stable() {
        let mut table = InodeTable::new();
        let a = table.get_or_insert("a.py");
        let b = table.get_or_insert("b.py");
        assert_ne!(a, b);
        assert_ne!(a, ROOT_INODE);
        assert_eq!(table.get_or_insert("a.py"), a);
        assert_eq!(table.name(b), Some("b.py"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut table = InodeTable::new();
        let a = table.get_or_insert("a.py");
        assert_eq!(table.remove("a.py"), Some(a));
        assert!(table.name(a).is_none());
        assert!(table.is_empty());
        assert_eq!(table.remove("a.py"), None);
    }

    #[test]
    fn test_numbers_not_reused() {
        let mut table = InodeTable::new();
        let a = table.get_or_insert("a.py");
        table.remove("a.py");
        assert_ne!(table.get_or_insert("a.py"), a);
    }

    #[test]
    fn test_rename_keeps_inode() {
        let mut table = InodeTable::new();
        let a = table.get_or_insert("a.py");
        table.rename("a.py", "c.py");
        assert_eq!(table.inode("c.py"), Some(a));
        assert!(table.inode("a.py").is_none());
        assert_eq!(table.name(a), Some("c.py"));
    }

    #[test]
    fn test_rename_over_existing() {
        let mut table = InodeTable::new();
        let a = table.get_or_insert("a.py");
        let b = table.get_or_insert("b.py");
        table.rename("a.py", "b.py");
        assert_eq!(table.inode("b.py"), Some(a));
        assert!(table.name(b).is_none());
        assert_eq!(table.len(), 1);
    }
}
