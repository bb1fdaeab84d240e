//! Path-based [`VfsOps`] over a [`Node`] tree.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::error::{VfsError, VfsResult};
use super::ops::VfsOps;
use super::tree::Node;
use super::types::{DirEntry, FileAttr, OpenFlags};

/// Serves a node tree through the path-based VFS interface.
#[derive(Debug, Clone)]
pub struct TreeFs {
    root: Arc<Node>,
}

impl TreeFs {
    pub fn new(root: Arc<Node>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    fn file(&self, path: &Path) -> VfsResult<Arc<Node>> {
        let node = self.root.walk(path)?;
        if node.is_dir() {
            return Err(VfsError::is_a_directory(path.display().to_string()));
        }
        Ok(node)
    }
}

#[async_trait]
impl VfsOps for TreeFs {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let node = self.root.walk(path)?;
        Ok(node.attr().await)
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        self.root.walk(path)?.entries()
    }

    async fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<()> {
        let node = self.root.walk(path)?;
        match node.file_ops() {
            Some(ops) => {
                debug!("open {} {:?}", path.display(), flags);
                ops.open(flags).await
            }
            // Directories open trivially unless someone asks to write them.
            None if flags.write || flags.truncate => {
                Err(VfsError::is_a_directory(path.display().to_string()))
            }
            None => Ok(()),
        }
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let node = self.file(path)?;
        let ops = node
            .file_ops()
            .ok_or_else(|| VfsError::is_a_directory(path.display().to_string()))?;
        ops.read(offset, size).await
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        let node = self.file(path)?;
        let ops = node
            .file_ops()
            .ok_or_else(|| VfsError::is_a_directory(path.display().to_string()))?;
        debug!("write {} offset={} len={}", path.display(), offset, data.len());
        ops.write(offset, data).await
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| VfsError::invalid_path(path.display().to_string()))?;
        let parent = self
            .root
            .walk(path.parent().unwrap_or_else(|| Path::new("")))?;
        if !parent.is_dir() {
            return Err(VfsError::not_a_directory(path.display().to_string()));
        }
        let handler = parent
            .dir_ops()
            .ok_or_else(|| VfsError::permission_denied(path.display().to_string()))?;
        let node = handler.create(&name, mode).await?;
        Ok(node.attr().await)
    }

    fn read_only(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{DirOps, FileOps, FileType};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        data: Mutex<Vec<u8>>,
        opens: Mutex<Vec<OpenFlags>>,
    }

    #[async_trait]
    impl FileOps for Recorder {
        async fn open(&self, flags: OpenFlags) -> VfsResult<()> {
            self.opens.lock().push(flags);
            Ok(())
        }

        async fn read(&self, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
            let data = self.data.lock();
            let start = (offset as usize).min(data.len());
            let end = (start + size as usize).min(data.len());
            Ok(data[start..end].to_vec())
        }

        async fn write(&self, offset: u64, bytes: &[u8]) -> VfsResult<u32> {
            let mut data = self.data.lock();
            let offset = offset as usize;
            if data.len() < offset + bytes.len() {
                data.resize(offset + bytes.len(), 0);
            }
            data[offset..offset + bytes.len()].copy_from_slice(bytes);
            Ok(bytes.len() as u32)
        }

        async fn size(&self) -> u64 {
            self.data.lock().len() as u64
        }
    }

    struct MakeDirs;

    #[async_trait]
    impl DirOps for MakeDirs {
        async fn create(&self, name: &str, perm: u32) -> VfsResult<Arc<Node>> {
            Ok(Node::directory(name, perm, None))
        }
    }

    fn fixture() -> (TreeFs, Arc<Recorder>) {
        let root = Node::root();
        let dir = root.add_dir("dir", 0o755, Some(Arc::new(MakeDirs))).unwrap();
        let file = Arc::new(Recorder::default());
        dir.add_child("file", 0o666, file.clone()).unwrap();
        (TreeFs::new(root), file)
    }

    #[tokio::test]
    async fn test_open_read_write_dispatch() {
        let (fs, file) = fixture();
        fs.open(Path::new("/dir/file"), OpenFlags::write()).await.unwrap();
        assert_eq!(fs.write(Path::new("/dir/file"), 0, b"hello").await.unwrap(), 5);
        assert_eq!(fs.read(Path::new("dir/file"), 1, 3).await.unwrap(), b"ell");
        assert_eq!(file.opens.lock().len(), 1);

        let attr = fs.getattr(Path::new("/dir/file")).await.unwrap();
        assert_eq!(attr.size, 5);
    }

    #[tokio::test]
    async fn test_read_all() {
        let (fs, _) = fixture();
        fs.write(Path::new("/dir/file"), 0, b"contents").await.unwrap();
        assert_eq!(fs.read_all(Path::new("/dir/file")).await.unwrap(), b"contents");
    }

    #[tokio::test]
    async fn test_directory_errors() {
        let (fs, _) = fixture();
        assert!(matches!(
            fs.read(Path::new("/dir"), 0, 10).await,
            Err(VfsError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.open(Path::new("/dir"), OpenFlags::truncate()).await,
            Err(VfsError::IsADirectory(_))
        ));
        assert!(fs.open(Path::new("/dir"), OpenFlags::read()).await.is_ok());
        assert!(matches!(
            fs.readdir(Path::new("/dir/file")).await,
            Err(VfsError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_mkdir_uses_dir_handler() {
        let (fs, _) = fixture();
        let attr = fs.mkdir(Path::new("/dir/sub"), 0o755).await.unwrap();
        assert_eq!(attr.kind, FileType::Directory);

        // Root has no handler.
        assert!(matches!(
            fs.mkdir(Path::new("/elsewhere"), 0o755).await,
            Err(VfsError::PermissionDenied(_))
        ));
    }
}
