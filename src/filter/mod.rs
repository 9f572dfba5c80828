//! # Global Query Filters
//!
//! Named, type-scoped predicate transforms applied transparently to queries
//! issued through a session. One global registry holds the filters; each
//! session gets a lazily derived view resolving which filters are active for
//! it, without the registry ever owning the session.
//!
//! ## Components
//!
//! - [`types`] - filter identity and definition
//! - [`registry`] - the [`FilterRegistry`] and the [`Filtered`] pipeline token
//! - [`context`] - the [`Session`] identity trait and the weak session side-table

pub mod context;
pub mod registry;
pub mod types;

pub use context::Session;
pub use registry::{FilterRegistry, Filtered};
pub use types::{FilterId, GlobalFilter, PredicateBuilder};
