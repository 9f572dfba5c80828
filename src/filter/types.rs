//! Filter identity and definition

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a registered global filter.
///
/// Callers may supply their own key at registration; when they don't, a
/// unique id is generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterId(String);

impl FilterId {
    /// A caller-supplied identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A generated unique identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identity as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FilterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FilterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Capability that rewrites a query over the filter's target type.
///
/// Treated as a pure transformation: given a query, return the filtered
/// query. Composition is sequential application in registration order.
pub type PredicateBuilder<Q> = Arc<dyn Fn(Q) -> Q + Send + Sync>;

/// A named, type-scoped predicate transform applied transparently to queries
/// for its target entity type.
pub struct GlobalFilter<Q> {
    id: FilterId,
    entity_type: String,
    predicate: PredicateBuilder<Q>,
    default_enabled: bool,
}

impl<Q> GlobalFilter<Q> {
    pub fn new(
        id: FilterId,
        entity_type: impl Into<String>,
        predicate: PredicateBuilder<Q>,
        default_enabled: bool,
    ) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            predicate,
            default_enabled,
        }
    }

    /// The filter's identity
    pub fn id(&self) -> &FilterId {
        &self.id
    }

    /// The entity type this filter rewrites queries for
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Whether the filter applies to sessions without an explicit override
    pub fn default_enabled(&self) -> bool {
        self.default_enabled
    }

    /// Rewrite a query through this filter's predicate
    pub fn apply(&self, query: Q) -> Q {
        (self.predicate)(query)
    }
}

impl<Q> std::fmt::Debug for GlobalFilter<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalFilter")
            .field("id", &self.id)
            .field("entity_type", &self.entity_type)
            .field("default_enabled", &self.default_enabled)
            .finish_non_exhaustive()
    }
}
