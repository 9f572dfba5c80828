//! Crate-level error aggregation

use crate::cache::errors::CacheError;
use crate::query::QueryError;
use thiserror::Error;

/// Errors surfaced by the cache and filter subsystems
#[derive(Debug, Error)]
pub enum QuerykitError {
    /// Cache operation failed (key derivation, population, worker hand-off)
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The external query collaborator failed
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, QuerykitError>;
