//! Static node tree backing the synthetic namespace.
//!
//! Nodes are built at startup and grown on demand; they are never removed.
//! A directory keeps its children in a `BTreeMap` so listings come out
//! sorted without extra work.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::SystemTime;

use super::error::{VfsError, VfsResult};
use super::ops::{DirOps, FileOps};
use super::types::{DirEntry, FileAttr, FileType};

/// Permission bits for the root directory.
pub const ROOT_PERM: u32 = 0o555;

/// What a node is, along with the handler that backs it.
pub enum NodeKind {
    Directory {
        children: RwLock<BTreeMap<String, Arc<Node>>>,
        handler: Option<Arc<dyn DirOps>>,
    },
    File(Arc<dyn FileOps>),
}

/// A named entry in the tree.
pub struct Node {
    name: String,
    perm: u32,
    ctime: SystemTime,
    kind: NodeKind,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            NodeKind::Directory { .. } => "directory",
            NodeKind::File(_) => "file",
        };
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("perm", &format_args!("{:o}", self.perm))
            .field("kind", &kind)
            .finish()
    }
}

impl Node {
    /// Create the root directory `/`.
    pub fn root() -> Arc<Node> {
        Self::directory("/", ROOT_PERM, None)
    }

    /// Create a detached directory node.
    pub fn directory(
        name: impl Into<String>,
        perm: u32,
        handler: Option<Arc<dyn DirOps>>,
    ) -> Arc<Node> {
        Arc::new(Node {
            name: name.into(),
            perm,
            ctime: SystemTime::now(),
            kind: NodeKind::Directory {
                children: RwLock::new(BTreeMap::new()),
                handler,
            },
        })
    }

    /// Create a detached file node.
    pub fn file(name: impl Into<String>, perm: u32, handler: Arc<dyn FileOps>) -> Arc<Node> {
        Arc::new(Node {
            name: name.into(),
            perm,
            ctime: SystemTime::now(),
            kind: NodeKind::File(handler),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn perm(&self) -> u32 {
        self.perm
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// The file handler, if this is a file.
    pub fn file_ops(&self) -> Option<&Arc<dyn FileOps>> {
        match &self.kind {
            NodeKind::File(ops) => Some(ops),
            NodeKind::Directory { .. } => None,
        }
    }

    /// The directory handler, if this is a directory that accepts new children.
    pub fn dir_ops(&self) -> Option<&Arc<dyn DirOps>> {
        match &self.kind {
            NodeKind::Directory { handler, .. } => handler.as_ref(),
            NodeKind::File(_) => None,
        }
    }

    /// Attach an already-built node as a child of this directory.
    ///
    /// Fails without side effects if the name is taken.
    pub fn attach(&self, child: Arc<Node>) -> VfsResult<()> {
        let name = child.name.clone();
        self.attach_with(&name, || Ok((child, ())))
    }

    /// Build a child and attach it under `name`.
    ///
    /// `build` runs only after `name` is known to be valid and free, with
    /// this directory locked, so a rejected name never reaches it. It must
    /// not touch this directory.
    pub fn attach_with<T, F>(&self, name: &str, build: F) -> VfsResult<T>
    where
        F: FnOnce() -> VfsResult<(Arc<Node>, T)>,
    {
        validate_name(name)?;
        let NodeKind::Directory { children, .. } = &self.kind else {
            return Err(VfsError::not_a_directory(self.name.clone()));
        };
        let mut children = children.write();
        if children.contains_key(name) {
            return Err(VfsError::already_exists(format!(
                "{}/{}",
                self.name.trim_end_matches('/'),
                name
            )));
        }

        let (child, built) = build()?;
        if child.name != name {
            return Err(VfsError::invalid_path(child.name.clone()));
        }
        children.insert(child.name.clone(), child);
        Ok(built)
    }

    /// Create a file child backed by `handler`.
    pub fn add_child(
        &self,
        name: impl Into<String>,
        perm: u32,
        handler: Arc<dyn FileOps>,
    ) -> VfsResult<Arc<Node>> {
        let node = Node::file(name, perm, handler);
        self.attach(Arc::clone(&node))?;
        Ok(node)
    }

    /// Create a directory child, optionally accepting new children through `handler`.
    pub fn add_dir(
        &self,
        name: impl Into<String>,
        perm: u32,
        handler: Option<Arc<dyn DirOps>>,
    ) -> VfsResult<Arc<Node>> {
        let node = Node::directory(name, perm, handler);
        self.attach(Arc::clone(&node))?;
        Ok(node)
    }

    /// Look up a direct child.
    pub fn child(&self, name: &str) -> Option<Arc<Node>> {
        match &self.kind {
            NodeKind::Directory { children, .. } => children.read().get(name).cloned(),
            NodeKind::File(_) => None,
        }
    }

    /// Direct children, sorted by name. Empty for files.
    pub fn children(&self) -> Vec<Arc<Node>> {
        match &self.kind {
            NodeKind::Directory { children, .. } => children.read().values().cloned().collect(),
            NodeKind::File(_) => Vec::new(),
        }
    }

    /// Directory listing.
    pub fn entries(&self) -> VfsResult<Vec<DirEntry>> {
        if !self.is_dir() {
            return Err(VfsError::not_a_directory(self.name.clone()));
        }
        Ok(self
            .children()
            .iter()
            .map(|child| {
                let kind = if child.is_dir() {
                    FileType::Directory
                } else {
                    FileType::File
                };
                DirEntry::new(child.name.clone(), kind)
            })
            .collect())
    }

    /// Resolve `path` relative to this node.
    ///
    /// Leading `/` and `.` components are ignored; `..` is rejected since
    /// nodes do not keep parent links.
    pub fn walk(self: &Arc<Self>, path: &Path) -> VfsResult<Arc<Node>> {
        let mut current = Arc::clone(self);
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    return Err(VfsError::invalid_path(path.display().to_string()));
                }
                Component::Normal(name) => {
                    let name = name.to_string_lossy();
                    if !current.is_dir() {
                        return Err(VfsError::not_a_directory(path.display().to_string()));
                    }
                    current = current
                        .child(&name)
                        .ok_or_else(|| VfsError::not_found(path.display().to_string()))?;
                }
            }
        }
        Ok(current)
    }

    /// Attributes, asking the file handler for its current length.
    pub async fn attr(&self) -> FileAttr {
        match &self.kind {
            NodeKind::Directory { .. } => FileAttr::directory(self.perm, self.ctime),
            NodeKind::File(ops) => FileAttr::file(ops.size().await, self.perm, self.ctime),
        }
    }
}

fn validate_name(name: &str) -> VfsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(VfsError::invalid_path(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::OpenFlags;
    use async_trait::async_trait;

    struct Fixed(&'static [u8]);

    #[async_trait]
    impl FileOps for Fixed {
        async fn open(&self, _flags: OpenFlags) -> VfsResult<()> {
            Ok(())
        }

        async fn read(&self, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
            let start = (offset as usize).min(self.0.len());
            let end = (start + size as usize).min(self.0.len());
            Ok(self.0[start..end].to_vec())
        }

        async fn write(&self, _offset: u64, _data: &[u8]) -> VfsResult<u32> {
            Err(VfsError::permission_denied("fixed"))
        }

        async fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    #[test]
    fn test_add_child_rejects_duplicates() {
        let root = Node::root();
        root.add_child("motd", 0o444, Arc::new(Fixed(b"hi"))).unwrap();

        let err = root
            .add_child("motd", 0o444, Arc::new(Fixed(b"again")))
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn test_invalid_names() {
        let root = Node::root();
        for name in ["", ".", "..", "a/b"] {
            let result = root.add_dir(name, 0o755, None);
            assert!(matches!(result, Err(VfsError::InvalidPath(_))), "{name:?}");
        }
    }

    #[test]
    fn test_attach_with_skips_build_for_rejected_names() {
        let root = Node::root();
        root.add_dir("taken", 0o755, None).unwrap();

        for name in ["taken", "a/b", ".."] {
            let mut built = false;
            let result = root.attach_with(name, || {
                built = true;
                Ok((Node::directory(name, 0o755, None), ()))
            });
            assert!(result.is_err(), "{name:?}");
            assert!(!built, "{name:?}");
        }

        let value = root
            .attach_with("fresh", || Ok((Node::directory("fresh", 0o755, None), 7)))
            .unwrap();
        assert_eq!(value, 7);
        assert!(root.child("fresh").is_some());

        // The built node must carry the name it is attached under.
        let err = root
            .attach_with("x", || Ok((Node::directory("y", 0o755, None), ())))
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
        assert!(root.child("x").is_none() && root.child("y").is_none());
    }

    #[test]
    fn test_cannot_attach_to_file() {
        let root = Node::root();
        let file = root.add_child("f", 0o444, Arc::new(Fixed(b""))).unwrap();
        let err = file.add_dir("sub", 0o755, None).unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));
    }

    #[test]
    fn test_walk() {
        let root = Node::root();
        let dir = root.add_dir("a", 0o755, None).unwrap();
        dir.add_child("b", 0o444, Arc::new(Fixed(b"x"))).unwrap();

        assert_eq!(root.walk(Path::new("/a/b")).unwrap().name(), "b");
        assert_eq!(root.walk(Path::new("a/./b")).unwrap().name(), "b");
        assert_eq!(root.walk(Path::new("/")).unwrap().name(), "/");
        assert!(matches!(
            root.walk(Path::new("a/missing")),
            Err(VfsError::NotFound(_))
        ));
        assert!(matches!(
            root.walk(Path::new("a/b/c")),
            Err(VfsError::NotADirectory(_))
        ));
        assert!(matches!(
            root.walk(Path::new("a/../a")),
            Err(VfsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_entries_sorted_and_attr() {
        let root = Node::root();
        root.add_child("zeta", 0o444, Arc::new(Fixed(b"abc"))).unwrap();
        root.add_dir("alpha", 0o755, None).unwrap();

        let entries = root.entries().unwrap();
        assert_eq!(
            entries,
            vec![DirEntry::directory("alpha"), DirEntry::file("zeta")]
        );

        let attr = root.child("zeta").unwrap().attr().await;
        assert!(attr.is_file());
        assert_eq!(attr.size, 3);
        assert_eq!(attr.perm, 0o444);
    }
}
