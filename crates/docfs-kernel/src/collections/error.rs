//! Errors from the collection files and the namespace builder.

use std::io;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CollectionError {
    /// A collection directory could not be attached to the tree.
    #[error("cannot build collection {name}: {reason}")]
    Structure { name: String, reason: String },

    /// The database would not list its collections.
    #[error("cannot list collections: {0}")]
    Listing(#[source] StoreError),

    /// The query file does not hold a JSON object.
    #[error("invalid query: {0}")]
    Query(#[source] serde_json::Error),

    /// The database rejected the find or map-reduce.
    #[error("query failed: {0}")]
    Execution(#[source] StoreError),

    /// The result set could not be rendered as text.
    #[error("cannot render documents: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The written content is not an array of documents.
    #[error("malformed document batch ({written} bytes accepted): {source}")]
    MalformedBatch {
        written: u32,
        #[source]
        source: serde_json::Error,
    },

    /// An insert or update failed while applying a batch.
    #[error("cannot store document ({written} bytes accepted): {source}")]
    Persistence {
        written: u32,
        #[source]
        source: StoreError,
    },

    /// The write would grow the file past the size limit.
    #[error("write ending at byte {end} exceeds the file size limit")]
    TooLarge { end: u64 },
}

impl CollectionError {
    /// Bytes the buffer accepted before the failure, for partial writes.
    pub fn written(&self) -> Option<u32> {
        match self {
            CollectionError::MalformedBatch { written, .. }
            | CollectionError::Persistence { written, .. } => Some(*written),
            _ => None,
        }
    }

    pub(crate) fn io_kind(&self) -> io::ErrorKind {
        match self {
            CollectionError::Structure { .. } => io::ErrorKind::AlreadyExists,
            CollectionError::Query(_) | CollectionError::MalformedBatch { .. } => {
                io::ErrorKind::InvalidData
            }
            CollectionError::TooLarge { .. } => io::ErrorKind::FileTooLarge,
            _ => io::ErrorKind::Other,
        }
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;
