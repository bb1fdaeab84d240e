//! Scratch text files: `query`, `map` and `reduce`.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::buffer::ByteBuffer;
use super::error::CollectionResult;
use crate::vfs::{FileOps, OpenFlags, VfsResult};

/// An editable in-memory text file with no database behind it.
#[derive(Debug, Default)]
pub struct TextFile {
    buf: Mutex<ByteBuffer>,
}

impl TextFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the content when `flags.truncate` is set.
    pub fn open(&self, flags: OpenFlags) {
        if flags.truncate {
            self.buf.lock().clear();
        }
    }

    pub fn read(&self, offset: u64, size: u32) -> Vec<u8> {
        self.buf.lock().read(offset, size)
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> CollectionResult<u32> {
        self.buf.lock().write(offset, data)
    }

    /// Current logical content.
    pub fn snapshot(&self) -> Vec<u8> {
        self.buf.lock().as_slice().to_vec()
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().is_empty()
    }
}

#[async_trait]
impl FileOps for TextFile {
    async fn open(&self, flags: OpenFlags) -> VfsResult<()> {
        TextFile::open(self, flags);
        Ok(())
    }

    async fn read(&self, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        Ok(TextFile::read(self, offset, size))
    }

    async fn write(&self, offset: u64, data: &[u8]) -> VfsResult<u32> {
        Ok(TextFile::write(self, offset, data)?)
    }

    async fn size(&self) -> u64 {
        self.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_on_open() {
        let text = TextFile::new();
        text.write(0, br#"{"name": "ada"}"#).unwrap();

        text.open(OpenFlags::write());
        assert_eq!(text.len(), 15);

        text.open(OpenFlags::truncate());
        assert!(text.is_empty());
        assert!(text.snapshot().is_empty());
    }

    #[test]
    fn test_overwrite_shorter_hides_tail() {
        let text = TextFile::new();
        text.write(0, &[b'a'; 100]).unwrap();
        text.write(0, b"xyz").unwrap();
        assert_eq!(text.len(), 3);
        assert_eq!(text.snapshot(), b"xyz");
    }

    #[test]
    fn test_streamed_writes_accumulate() {
        let text = TextFile::new();
        text.write(0, b"emit(doc.k, ").unwrap();
        text.write(12, b"1);").unwrap();
        assert_eq!(text.snapshot(), b"emit(doc.k, 1);");
        assert_eq!(text.read(5, 5), b"doc.k");
        assert!(text.read(15, 10).is_empty());
    }

    #[tokio::test]
    async fn test_file_ops_surface() {
        let text = TextFile::new();
        let ops: &dyn FileOps = &text;
        assert_eq!(ops.write(0, b"abc").await.unwrap(), 3);
        assert_eq!(ops.read(1, 10).await.unwrap(), b"bc");
        assert_eq!(ops.size().await, 3);
        ops.open(OpenFlags::truncate()).await.unwrap();
        assert_eq!(ops.size().await, 0);
    }
}
