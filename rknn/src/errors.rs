//! Error and result types shared by every layer of the index.

use std::io;
use thiserror::Error;

/// Errors raised by the node store, the tree and the RkNN query engines.
#[derive(Debug, Error)]
pub enum RknnError {
    /// A referenced node id is missing from both the cache and the backing store.
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Delete could not locate a leaf holding the node.
    #[error("no leaf holds node {0}")]
    LeafNotFound(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failure reported by a [`KeyValueStore`](crate::store::KeyValueStore) backend.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("store is closed")]
    Closed,
}

impl From<bincode::error::EncodeError> for RknnError {
    fn from(err: bincode::error::EncodeError) -> Self {
        RknnError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for RknnError {
    fn from(err: bincode::error::DecodeError) -> Self {
        RknnError::Serialization(err.to_string())
    }
}

/// Result type for index operations
pub type RknnResult<T> = Result<T, RknnError>;
