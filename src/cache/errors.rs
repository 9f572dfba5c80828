//! Cache error types

use crate::query::QueryError;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// The query could not be rendered into a deterministic cache key
    #[error("cache key derivation failed: {0}")]
    KeyDerivation(String),

    /// The population callback (external query execution) failed.
    ///
    /// Nothing is cached for the key; a subsequent call retries population.
    #[error("query population failed: {0}")]
    Population(#[from] QueryError),

    /// The worker task running an asynchronous population was lost
    #[error("cache worker task failed: {0}")]
    TaskJoin(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
