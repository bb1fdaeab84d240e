//! In-memory database.
//!
//! Thread-safe via `DashMap` for the collection table and a `RwLock` per
//! collection. All data is lost when dropped.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::filter;
use super::map_reduce::{self, MapReduce};
use super::object_id::ObjectId;
use super::{Collection, Database, Document, ID_FIELD};

/// In-memory database.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    collections: DashMap<String, Arc<MemoryCollection>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle to a collection, creating it if needed.
    pub fn memory_collection(&self, name: &str) -> Arc<MemoryCollection> {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn collection_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.memory_collection(name)
    }
}

/// One collection; documents keep insertion order.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    docs: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Copy of every stored document.
    pub fn all(&self) -> Vec<Document> {
        self.docs.read().clone()
    }

    fn filtered(&self, filter: &Document) -> StoreResult<Vec<Document>> {
        let docs = self.docs.read();
        let mut out = Vec::new();
        for doc in docs.iter() {
            if filter::matches(filter, doc)? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &Document) -> StoreResult<Vec<Document>> {
        let docs = self.filtered(filter)?;
        debug!("{}: find matched {} documents", self.name, docs.len());
        Ok(docs)
    }

    async fn map_reduce(&self, filter: &Document, job: &MapReduce) -> StoreResult<Vec<Document>> {
        let input = self.filtered(filter)?;
        debug!("{}: map-reduce over {} documents", self.name, input.len());
        map_reduce::run(input, job.clone()).await
    }

    async fn insert(&self, mut doc: Document) -> StoreResult<()> {
        let mut docs = self.docs.write();
        match doc.get(ID_FIELD) {
            Some(id) => {
                if docs.iter().any(|d| d.get(ID_FIELD).is_some_and(|d| same_id(d, id))) {
                    return Err(StoreError::InvalidDocument(format!("duplicate {ID_FIELD} {id}")));
                }
            }
            None => {
                doc.insert(ID_FIELD.to_string(), Value::String(ObjectId::new().to_hex()));
            }
        }
        docs.push(doc);
        Ok(())
    }

    async fn update_id(&self, id: &ObjectId, mut doc: Document) -> StoreResult<()> {
        let mut docs = self.docs.write();
        let slot = docs
            .iter_mut()
            .find(|d| d.get(ID_FIELD).and_then(parsed_id) == Some(*id))
            .ok_or_else(|| StoreError::NotFound(id.to_hex()))?;
        // The stored spelling of the id is kept.
        let stored = slot
            .remove(ID_FIELD)
            .unwrap_or_else(|| Value::String(id.to_hex()));
        doc.insert(ID_FIELD.to_string(), stored);
        *slot = doc;
        Ok(())
    }
}

fn parsed_id(value: &Value) -> Option<ObjectId> {
    value.as_str().and_then(|s| ObjectId::parse_str(s).ok())
}

/// Identifier equality: hex ids compare as ids, anything else as JSON.
fn same_id(a: &Value, b: &Value) -> bool {
    match (parsed_id(a), parsed_id(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
