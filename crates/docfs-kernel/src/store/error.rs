//! Database error types.

use thiserror::Error;

/// Errors reported by a [`Database`](super::Database) or
/// [`Collection`](super::Collection).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with the requested identifier.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The filter is valid JSON but not a query the database understands.
    #[error("bad filter: {0}")]
    BadFilter(String),

    /// A map or reduce script failed to compile or run.
    #[error("script error: {0}")]
    Script(String),

    /// A document could not be stored as given.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn bad_filter(msg: impl Into<String>) -> Self {
        Self::BadFilter(msg.into())
    }

    pub fn script(msg: impl std::fmt::Display) -> Self {
        Self::Script(msg.to_string())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Database result type.
pub type StoreResult<T> = Result<T, StoreError>;
