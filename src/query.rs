//! # Query Collaborator Seams
//!
//! The cache and filter subsystems sit in front of an external queryable data
//! source. That collaborator is a black box here and is specified only by the
//! capabilities it presents:
//!
//! - [`QueryShape`] - a query can describe its own structural fingerprint
//! - [`QuerySource`] - a query can be executed into a materialized result
//! - [`PlanCacheControl`] - a source may expose compiled-plan cache clearing
//!
//! Nothing in this module knows what a query *is*; callers bring their own
//! query and result types and implement these traits at the boundary.

use thiserror::Error;

/// Errors reported by the external query collaborator
#[derive(Debug, Error)]
pub enum QueryError {
    /// The source failed to materialize a result
    #[error("query execution failed: {0}")]
    Execution(String),

    /// The query cannot be rendered into a canonical structural form
    #[error("unsupported query shape: {0}")]
    UnsupportedShape(String),
}

/// Result type for collaborator operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Structural fingerprint of a query.
///
/// The shape covers the query's target type and its predicate / projection /
/// ordering / paging structure - never closure-captured runtime values unless
/// those values are part of the structural representation. Two queries with
/// the same structure must produce the same encoding; structurally different
/// queries must produce different encodings.
pub trait QueryShape {
    /// The entity type the query targets (type-erased identifier)
    fn entity_type(&self) -> &str;

    /// Canonical structural encoding of the query.
    ///
    /// Returns [`QueryError::UnsupportedShape`] when the query contains a
    /// construct that has no canonical form; the error surfaces to the caller
    /// before any population attempt.
    fn shape(&self) -> QueryResult<String>;
}

/// The external query execution engine.
///
/// Execution is synchronous and assumed idempotent with respect to caching:
/// executing the same structural query twice returns equivalent data modulo
/// concurrent external mutation. `Ok(None)` is a legitimate result (the query
/// matched nothing) and is cached as such.
pub trait QuerySource: Send + Sync {
    /// The query type this source executes
    type Query: QueryShape;

    /// The materialized result type
    type Value: Clone + Send + Sync;

    /// Translate and execute the query against the underlying store
    fn execute(&self, query: &Self::Query) -> QueryResult<Option<Self::Value>>;
}

/// Optional collaborator capability: clear compiled query plans for an entity
/// type.
///
/// Sources that compile queries into cached execution plans can grow stale
/// plans when global filters change the meaning of future queries. A source
/// that offers no such capability simply isn't wired in, and the feature is
/// omitted. Failures are diagnostic, never correctness-bearing; callers log
/// and continue.
pub trait PlanCacheControl: Send + Sync {
    /// Drop compiled plans for the given entity type
    fn clear_compiled_plans(&self, entity_type: &str) -> QueryResult<()>;
}
