//! # Query Result Cache
//!
//! Caches materialized query results under a deterministic key derived from
//! the query's structural shape and a caller-supplied tag list. A secondary
//! tag→keys index supports bulk invalidation in O(tag fan-out) instead of
//! O(cache size).
//!
//! ## Components
//!
//! - [`key`] - deterministic cache key derivation
//! - [`entry`] - cached values, the absent-result sentinel, expiration policies
//! - [`store`] - the thread-safe store with the tag index and race resolution
//! - [`source`] - [`CachedSource`], the caller-facing surface over a query source
//! - [`tags`] - the internal filter-correlation scope tag
//! - [`errors`] - cache error types

pub mod entry;
pub mod errors;
pub mod key;
pub mod source;
pub mod store;
pub mod tags;

pub use entry::{CachedValue, ExpirationPolicy};
pub use errors::{CacheError, CacheResult};
pub use key::{derive_key, CacheKey};
pub use source::CachedSource;
pub use store::{CacheStats, InvalidationSink, ResultCache};
pub use tags::scope_tag;
