#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # QueryKit Core
//!
//! Query-result caching with tag-based invalidation, and a global query
//! filter registry, layered in front of an external queryable data source.
//!
//! ## Overview
//!
//! Two cooperating subsystems share one design pattern (a global registry
//! plus per-consumer derived state):
//!
//! - [`cache`] - the [`ResultCache`]: a key→value store for materialized
//!   query results with a tag→keys index for O(tag fan-out) bulk
//!   invalidation, deterministic key derivation, and at-most-one-observed
//!   population under concurrent races. [`CachedSource`] is the caller-facing
//!   surface coupling the cache with a query source.
//! - [`filter`] - the [`FilterRegistry`]: named, type-scoped predicate
//!   transforms applied transparently to session queries, with per-session
//!   enable/disable overrides held in a non-owning side table. Registry
//!   mutations invalidate correlated cache entries through their scope tags.
//!
//! The external collaborators (query execution, predicate representation,
//! session lifecycle) are abstracted behind the traits in [`query`] and
//! [`filter`]; this crate never learns what a query is.
//!
//! ## Quick Start
//!
//! ```rust
//! use querykit_core::cache::derive_key;
//! use querykit_core::query::{QueryResult, QueryShape};
//! use querykit_core::{CacheConfig, CachedValue, ExpirationPolicy, ResultCache};
//!
//! struct AllOrders;
//!
//! impl QueryShape for AllOrders {
//!     fn entity_type(&self) -> &str {
//!         "orders"
//!     }
//!
//!     fn shape(&self) -> QueryResult<String> {
//!         Ok("all".to_string())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache: ResultCache<Vec<String>> = ResultCache::new(CacheConfig::default());
//! let key = derive_key(&AllOrders, &["orders"])?;
//!
//! let value = cache.get_or_add(&key, &["orders".to_string()], ExpirationPolicy::Never, || {
//!     Ok(Some(vec!["order-1".to_string()]))
//! })?;
//! assert_eq!(value, CachedValue::Found(vec!["order-1".to_string()]));
//!
//! // Bulk invalidation by tag
//! cache.invalidate_tag("orders");
//! assert!(cache.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cache`] - result store, tag index, key derivation, cached source surface
//! - [`filter`] - global filter registry and session filter contexts
//! - [`query`] - collaborator seams (query shape, source, plan-cache control)
//! - [`config`] - environment-aware cache configuration
//! - [`error`] - crate-level error aggregation
//! - [`logging`] - tracing initialization for hosts and tests

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod query;

pub use cache::{
    derive_key, scope_tag, CacheError, CacheKey, CacheResult, CacheStats, CachedSource,
    CachedValue, ExpirationPolicy, InvalidationSink, ResultCache,
};
pub use config::CacheConfig;
pub use error::{QuerykitError, Result};
pub use filter::{FilterId, FilterRegistry, Filtered, GlobalFilter, PredicateBuilder, Session};
pub use query::{PlanCacheControl, QueryError, QueryResult, QueryShape, QuerySource};
