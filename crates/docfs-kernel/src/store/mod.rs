//! Document database interface.
//!
//! The namespace only needs a handful of operations from a database, so the
//! driver is a pair of traits. [`MemoryDatabase`] implements them in-process
//! and is what the server runs against.

mod error;
pub mod filter;
pub mod map_reduce;
mod memory;
mod object_id;

use async_trait::async_trait;
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use map_reduce::MapReduce;
pub use memory::{MemoryCollection, MemoryDatabase};
pub use object_id::{MalformedObjectId, ObjectId};

/// A schema-less document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Name of the identifier field.
pub const ID_FIELD: &str = "_id";

/// A database holding named collections.
#[async_trait]
pub trait Database: Send + Sync {
    /// Names of the collections that currently exist.
    async fn collection_names(&self) -> StoreResult<Vec<String>>;

    /// Handle to the collection called `name`.
    ///
    /// Handles are cheap; the collection need not exist yet.
    fn collection(&self, name: &str) -> Arc<dyn Collection>;
}

/// A named set of documents.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// All documents matching `filter`, in natural order.
    async fn find(&self, filter: &Document) -> StoreResult<Vec<Document>>;

    /// Run a map-reduce job over the documents matching `filter`.
    async fn map_reduce(&self, filter: &Document, job: &MapReduce) -> StoreResult<Vec<Document>>;

    /// Insert a new document. An identifier is assigned if absent.
    async fn insert(&self, doc: Document) -> StoreResult<()>;

    /// Replace the body of the document identified by `id`.
    async fn update_id(&self, id: &ObjectId, doc: Document) -> StoreResult<()>;
}
