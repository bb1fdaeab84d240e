//! Collections exposed as directories.
//!
//! ```text
//! /collections/            Collections (mkdir creates a collection)
//! └── people/              CollectionNode
//!     ├── query            TextFile: JSON filter
//!     ├── map              TextFile: map script
//!     ├── reduce           TextFile: reduce script
//!     └── documents        DocumentsFile: results on open, upserts on write
//! ```

mod buffer;
mod documents;
mod error;
mod text;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use crate::store::Database;
use crate::vfs::{DirOps, Node, VfsError, VfsResult};

pub use buffer::{ByteBuffer, MAX_FILE_SIZE};
pub use documents::{DocumentsFile, render};
pub use error::{CollectionError, CollectionResult};
pub use text::TextFile;

/// Permissions of the namespace directory.
pub const NAMESPACE_PERM: u32 = 0o777;
/// Permissions of a collection directory.
pub const COLLECTION_PERM: u32 = 0o555;
/// Permissions of the files inside a collection directory.
pub const FILE_PERM: u32 = 0o666;

/// Default name of the namespace directory.
pub const DEFAULT_MOUNT: &str = "collections";

/// One collection's directory and its four files.
#[derive(Debug)]
pub struct CollectionNode {
    name: String,
    dir: Arc<Node>,
    query: Arc<TextFile>,
    map: Arc<TextFile>,
    reduce: Arc<TextFile>,
    documents: Arc<DocumentsFile>,
}

impl CollectionNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Arc<Node> {
        &self.dir
    }

    pub fn query(&self) -> &Arc<TextFile> {
        &self.query
    }

    pub fn map(&self) -> &Arc<TextFile> {
        &self.map
    }

    pub fn reduce(&self) -> &Arc<TextFile> {
        &self.reduce
    }

    pub fn documents(&self) -> &Arc<DocumentsFile> {
        &self.documents
    }
}

fn structure(name: &str, err: VfsError) -> CollectionError {
    CollectionError::Structure {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

/// Builds and owns one directory per collection.
pub struct Collections {
    db: Arc<dyn Database>,
    dir: Arc<Node>,
    registry: Mutex<HashMap<String, Arc<CollectionNode>>>,
}

impl std::fmt::Debug for Collections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collections")
            .field("dir", &self.dir.name())
            .field("collections", &self.names())
            .finish()
    }
}

impl Collections {
    /// Create an empty, detached namespace directory called `name`.
    ///
    /// Creating a directory inside it creates a collection.
    pub fn new(name: &str, db: Arc<dyn Database>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Collections>| {
            let handler: Arc<dyn DirOps> = Arc::new(CreateCollection(weak.clone()));
            Collections {
                db,
                dir: Node::directory(name, NAMESPACE_PERM, Some(handler)),
                registry: Mutex::new(HashMap::new()),
            }
        })
    }

    /// Build the namespace for every existing collection and attach it
    /// under `parent`.
    pub async fn mount(
        parent: &Node,
        name: &str,
        db: Arc<dyn Database>,
    ) -> CollectionResult<Arc<Self>> {
        let names = db
            .collection_names()
            .await
            .map_err(CollectionError::Listing)?;

        let collections = Self::new(name, db);
        for collection in &names {
            collections.create_or_get(collection)?;
        }
        parent
            .attach(Arc::clone(&collections.dir))
            .map_err(|e| structure(name, e))?;

        info!("mounted {} collections at {}", names.len(), name);
        Ok(collections)
    }

    /// Return the node for `name`, building it on first use.
    ///
    /// Children are attached to a detached directory first and the directory
    /// is attached last, so a failure leaves nothing reachable and nothing
    /// created in the database.
    pub fn create_or_get(&self, name: &str) -> CollectionResult<Arc<CollectionNode>> {
        let mut registry = self.registry.lock();
        if let Some(node) = registry.get(name) {
            return Ok(Arc::clone(node));
        }

        let node = self
            .dir
            .attach_with(name, || {
                let query = Arc::new(TextFile::new());
                let map = Arc::new(TextFile::new());
                let reduce = Arc::new(TextFile::new());
                let documents = Arc::new(DocumentsFile::new(
                    self.db.collection(name),
                    &query,
                    &map,
                    &reduce,
                ));

                let dir = Node::directory(name, COLLECTION_PERM, None);
                dir.add_child("query", FILE_PERM, query.clone())?;
                dir.add_child("map", FILE_PERM, map.clone())?;
                dir.add_child("reduce", FILE_PERM, reduce.clone())?;
                dir.add_child("documents", FILE_PERM, documents.clone())?;

                let node = Arc::new(CollectionNode {
                    name: name.to_string(),
                    dir: Arc::clone(&dir),
                    query,
                    map,
                    reduce,
                    documents,
                });
                Ok((dir, node))
            })
            .map_err(|e| structure(name, e))?;
        registry.insert(name.to_string(), Arc::clone(&node));
        debug!("created collection node {}", name);
        Ok(node)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CollectionNode>> {
        self.registry.lock().get(name).cloned()
    }

    /// Registered collection names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// The namespace directory.
    pub fn dir(&self) -> &Arc<Node> {
        &self.dir
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }
}

/// `mkdir` handler for the namespace directory.
struct CreateCollection(Weak<Collections>);

#[async_trait]
impl DirOps for CreateCollection {
    async fn create(&self, name: &str, _perm: u32) -> VfsResult<Arc<Node>> {
        let collections = self
            .0
            .upgrade()
            .ok_or_else(|| VfsError::other("collections namespace is gone"))?;
        let node = collections.create_or_get(name)?;
        Ok(Arc::clone(node.dir()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, Database, MemoryDatabase};
    use crate::vfs::{OpenFlags, TreeFs, VfsOps};
    use std::path::Path;

    fn memory_db() -> Arc<MemoryDatabase> {
        Arc::new(MemoryDatabase::new())
    }

    #[test]
    fn test_create_or_get_is_idempotent() {
        let collections = Collections::new(DEFAULT_MOUNT, memory_db());
        let first = collections.create_or_get("people").unwrap();
        let second = collections.create_or_get("people").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(collections.len(), 1);
        assert_eq!(collections.dir().children().len(), 1);

        let names: Vec<String> = first
            .dir()
            .children()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["documents", "map", "query", "reduce"]);
    }

    #[tokio::test]
    async fn test_collision_leaves_nothing_behind() {
        let db = memory_db();
        let collections = Collections::new(DEFAULT_MOUNT, db.clone());
        // Something else already owns the name in the tree.
        collections.dir().add_dir("taken", 0o755, None).unwrap();

        let err = collections.create_or_get("taken").unwrap_err();
        assert!(matches!(err, CollectionError::Structure { .. }));
        assert!(collections.get("taken").is_none());
        assert_eq!(collections.dir().children().len(), 1);
        assert!(db.collection_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_leaves_database_untouched() {
        let db = memory_db();
        db.collection("people");
        let collections = Collections::new(DEFAULT_MOUNT, db.clone());

        for bad in ["a/b", "", "..", "."] {
            let err = collections.create_or_get(bad).unwrap_err();
            assert!(matches!(err, CollectionError::Structure { .. }), "{bad:?}");
        }
        assert!(collections.is_empty());
        assert_eq!(db.collection_names().await.unwrap(), vec!["people"]);

        // A later mount sees only the real collection.
        let root = Node::root();
        let mounted = Collections::mount(&root, DEFAULT_MOUNT, db).await.unwrap();
        assert_eq!(mounted.names(), vec!["people"]);
    }

    #[tokio::test]
    async fn test_mount_lists_existing_collections() {
        let db = memory_db();
        db.collection("people");
        db.collection("orders");

        let root = Node::root();
        let collections = Collections::mount(&root, DEFAULT_MOUNT, db).await.unwrap();
        assert_eq!(collections.names(), vec!["orders", "people"]);

        let fs = TreeFs::new(root);
        let entries = fs.readdir(Path::new("/collections")).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(fs.exists(Path::new("/collections/people/documents")).await);
    }

    #[tokio::test]
    async fn test_mount_twice_under_same_parent_fails() {
        let root = Node::root();
        Collections::mount(&root, DEFAULT_MOUNT, memory_db()).await.unwrap();
        let err = Collections::mount(&root, DEFAULT_MOUNT, memory_db())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::Structure { .. }));
    }

    #[tokio::test]
    async fn test_mkdir_creates_collection() {
        let db = memory_db();
        let root = Node::root();
        let collections = Collections::mount(&root, DEFAULT_MOUNT, db.clone())
            .await
            .unwrap();
        let fs = TreeFs::new(root);

        let attr = fs.mkdir(Path::new("/collections/fresh"), 0o755).await.unwrap();
        assert!(attr.is_dir());
        assert_eq!(attr.perm, COLLECTION_PERM);
        assert!(collections.get("fresh").is_some());

        // Repeating the mkdir returns the same directory.
        fs.mkdir(Path::new("/collections/fresh"), 0o755).await.unwrap();
        assert_eq!(collections.len(), 1);

        // The documents file is wired to the database collection.
        let path = Path::new("/collections/fresh/documents");
        fs.write(path, 0, br#"[{"x": 1}]"#).await.unwrap();
        assert_eq!(db.memory_collection("fresh").len(), 1);
        fs.open(path, OpenFlags::read()).await.unwrap();
        assert!(fs.getattr(path).await.unwrap().size > 0);
        assert_eq!(db.collection("fresh").name(), "fresh");
    }
}
