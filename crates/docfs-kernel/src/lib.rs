//! # docfs-kernel
//!
//! A document database presented as a file tree.
//!
//! Each collection is a directory holding three scratch files (`query`,
//! `map`, `reduce`) and a `documents` file. Opening `documents` runs the
//! query, or a map-reduce job when map and reduce are set, and snapshots the
//! result as indented JSON. Writing a JSON array back inserts documents
//! without `_id` and updates the ones that carry one.
//!
//! - [`vfs`] - node tree, file callbacks, path-based operations
//! - [`store`] - database traits and the in-memory database
//! - [`collections`] - the collection files and the namespace builder

pub mod collections;
pub mod store;
pub mod vfs;

pub use collections::{
    CollectionError, CollectionNode, CollectionResult, Collections, DocumentsFile, TextFile,
};
pub use store::{
    Collection, Database, Document, MapReduce, MemoryDatabase, ObjectId, StoreError, StoreResult,
};
pub use vfs::{
    DirEntry, DirOps, FileAttr, FileOps, FileType, Node, OpenFlags, TreeFs, VfsError, VfsOps,
    VfsResult,
};
