//! Byte buffer with an explicit logical length.
//!
//! Shared by the text and documents files. A write always sets the logical
//! length to `offset + len`, so a short write over longer content hides the
//! tail. The hidden bytes stay in the backing vector until a later write
//! grows past them.

use super::error::{CollectionError, CollectionResult};

/// Largest logical length a synthetic file may reach.
pub const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    data: Vec<u8>,
    len: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physical size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Addressable content.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Drop all content.
    pub fn clear(&mut self) {
        self.data.clear();
        self.len = 0;
    }

    /// Replace the content wholesale.
    pub fn replace(&mut self, data: Vec<u8>) {
        self.len = data.len();
        self.data = data;
    }

    /// Up to `size` bytes from `offset`; empty at or past the end.
    pub fn read(&self, offset: u64, size: u32) -> Vec<u8> {
        if offset >= self.len as u64 {
            return Vec::new();
        }
        let start = offset as usize;
        let end = start.saturating_add(size as usize).min(self.len);
        self.data[start..end].to_vec()
    }

    /// Write `bytes` at `offset` and set the logical length to the end of
    /// the write. Gaps past the old length are zero-filled.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> CollectionResult<u32> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or(CollectionError::TooLarge {
                end: offset.saturating_add(bytes.len() as u64),
            })?;
        let (start, end) = (offset as usize, end as usize);

        if end > self.len {
            if end > self.data.len() {
                self.data.resize(end, 0);
            }
            if start > self.len {
                self.data[self.len..start].fill(0);
            }
        }
        self.data[start..end].copy_from_slice(bytes);
        self.len = end;
        Ok(bytes.len() as u32)
    }
}
