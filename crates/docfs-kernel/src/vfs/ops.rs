//! VFS operations traits.
//!
//! [`VfsOps`] is the path-based surface a transport talks to. [`FileOps`] and
//! [`DirOps`] are the per-node callbacks a synthetic file or directory
//! implements.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::VfsResult;
use super::tree::Node;
use super::types::{DirEntry, FileAttr, OpenFlags};

/// Callbacks for a synthetic file node.
///
/// Offsets are absolute. Each implementation guards its own state; callers
/// may invoke these concurrently.
#[async_trait]
pub trait FileOps: Send + Sync {
    /// Called when a client opens the file.
    async fn open(&self, flags: OpenFlags) -> VfsResult<()>;

    /// Reads up to `size` bytes starting at `offset`.
    ///
    /// Returns an empty vector at or past end of data.
    async fn read(&self, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Writes `data` at `offset`, returning the number of bytes accepted.
    async fn write(&self, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Current logical length.
    async fn size(&self) -> u64;
}

/// Callbacks for a directory that accepts new children.
#[async_trait]
pub trait DirOps: Send + Sync {
    /// Create (or return the existing) child directory called `name`.
    async fn create(&self, name: &str, perm: u32) -> VfsResult<Arc<Node>>;
}

/// Core VFS operations trait.
///
/// All operations are path-based (no inode numbers, no handles) so they map
/// directly onto request/response transports.
#[async_trait]
pub trait VfsOps: Send + Sync {
    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries, sorted by name.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Open a file, running whatever side effects its handler attaches to open.
    async fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<()>;

    /// Read file contents.
    ///
    /// Reads up to `size` bytes starting at `offset`.
    /// Returns fewer bytes if EOF is reached.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Write data to a file.
    ///
    /// Writes `data` at the specified `offset`.
    /// Returns the number of bytes written.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Create a new directory.
    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Open and read entire file contents.
    async fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        self.open(path, OpenFlags::read()).await?;
        let attr = self.getattr(path).await?;
        self.read(path, 0, u32::try_from(attr.size).unwrap_or(u32::MAX))
            .await
    }
}
