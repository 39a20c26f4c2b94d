//! Byte-level edits on script content.
//!
//! FUSE reads, writes and truncates address bytes, while files hold text.
//! [`ContentBuffer`] works on the UTF-8 bytes and converts back to text once
//! the edit is complete, so a write that leaves invalid UTF-8 is reported as
//! an encoding violation instead of being stored lossily.

use numfs_core::StoreResult;
use numfs_core::codec;

/// UTF-8 bytes of one file's content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBuffer {
    bytes: Vec<u8>,
}

impl ContentBuffer {
    pub fn new(content: &str) -> Self {
        Self {
            bytes: content.as_bytes().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads up to `size` bytes starting at `offset`.
    ///
    /// Reading at or past the end yields an empty slice.
    pub fn read(&self, offset: usize, size: usize) -> &[u8] {
        if offset >= self.bytes.len() {
            return &[];
        }
        let end = offset.saturating_add(size).min(self.bytes.len());
        &self.bytes[offset..end]
    }

    /// Writes `data` at `offset`, returning the number of bytes written.
    ///
    /// Bytes outside the written range are kept and any gap past the
    /// current end is zero-filled. An empty write changes nothing.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let end = offset + data.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[offset..end].copy_from_slice(data);
        data.len()
    }

    /// Truncates or zero-extends to exactly `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.resize(len, 0);
    }

    /// Converts the edited bytes back to text for the file named `name`.
    pub fn into_text(self, name: &str) -> StoreResult<String> {
        codec::decode_content(name, self.bytes)
    }
}
