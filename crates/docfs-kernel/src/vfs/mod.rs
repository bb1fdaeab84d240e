//! Virtual filesystem plumbing for the synthetic namespace.
//!
//! Key components:
//!
//! - [`Node`] - Named entry in a static tree (directory or synthetic file)
//! - [`FileOps`] / [`DirOps`] - Per-node callbacks (open/read/write, create)
//! - [`VfsOps`] - Path-based operations a transport talks to
//! - [`TreeFs`] - [`VfsOps`] implemented by walking a [`Node`] tree
//!
//! ## Design Decisions
//!
//! - **Path-based, no handles**: Read/write take offset and size, so a
//!   request/response transport needs no per-client state.
//! - **Content lives in handlers**: the tree only knows names and
//!   permissions; every byte comes from a [`FileOps`] implementation.

mod error;
mod ops;
mod tree;
mod tree_fs;
mod types;

pub use error::{VfsError, VfsResult};
pub use ops::{DirOps, FileOps, VfsOps};
pub use tree::{Node, NodeKind, ROOT_PERM};
pub use tree_fs::TreeFs;
pub use types::{DirEntry, FileAttr, FileType, OpenFlags};
