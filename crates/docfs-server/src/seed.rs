//! Populate the in-memory database from a JSON file.
//!
//! The file maps collection names to arrays of documents:
//!
//! ```json
//! { "people": [{ "name": "ada" }], "orders": [] }
//! ```
//!
//! An empty array still creates the collection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use docfs_kernel::store::MemoryDatabase;
use docfs_kernel::{Collection, Database, Document, StoreError};

pub type SeedData = BTreeMap<String, Vec<Document>>;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid seed file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to seed collection {collection}: {source}")]
    Store {
        collection: String,
        source: StoreError,
    },
}

/// Insert every document in `data`; returns the number inserted.
pub async fn seed(db: &MemoryDatabase, data: SeedData) -> Result<usize, SeedError> {
    let mut inserted = 0;
    for (name, docs) in data {
        let collection = db.collection(&name);
        let count = docs.len();
        for doc in docs {
            collection
                .insert(doc)
                .await
                .map_err(|source| SeedError::Store {
                    collection: name.clone(),
                    source,
                })?;
        }
        debug!("seeded {} documents into {}", count, collection.name());
        inserted += count;
    }
    Ok(inserted)
}

/// Read `path` and seed `db` with its contents.
pub async fn load(db: &MemoryDatabase, path: &Path) -> Result<usize, SeedError> {
    let text = tokio::fs::read(path).await.map_err(|source| SeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let data: SeedData = serde_json::from_slice(&text).map_err(|source| SeedError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let inserted = seed(db, data).await?;
    info!("seeded {} documents from {}", inserted, path.display());
    Ok(inserted)
}
