//! Error types for the cache layer.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Failed to serialize/deserialize a cache entry.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A compute callback failed while filling a miss.
    #[error("Compute error: {0}")]
    Compute(String),
}
