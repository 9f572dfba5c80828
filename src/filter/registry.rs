//! # Global Query Filter Registry
//!
//! Maintains a process-wide, mutable set of named query-rewrite predicates
//! per entity type and materializes a per-session view resolving which
//! predicates are active for that session.
//!
//! The registry is a constructed instance, not a global singleton: hosts
//! build one and inject it wherever queries are issued. It reaches the result
//! cache only through the [`InvalidationSink`] seam and the external source
//! only through the optional [`PlanCacheControl`] capability.
//!
//! ## Generations
//!
//! Every mutation bumps an atomic generation counter. Session contexts record
//! the generation they last resolved against and rebuild lazily on next
//! access once the registry moves, so a mutation is a cheap O(1) bump instead
//! of an eager walk over every live session.
//!
//! ## Double application
//!
//! [`FilterRegistry::apply_filters`] consumes an unfiltered query and returns
//! a [`Filtered`] token; re-presenting a token through
//! [`FilterRegistry::reapply`] is a no-op. Filters therefore apply exactly
//! once per query, enforced by the type system rather than by inspecting the
//! query for a marker.

use crate::cache::store::InvalidationSink;
use crate::cache::tags::scope_tag;
use crate::filter::context::{Session, SessionContexts};
use crate::filter::types::{FilterId, GlobalFilter, PredicateBuilder};
use crate::query::PlanCacheControl;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A query that has passed through the filter pipeline.
///
/// The execution side of the pipeline accepts only `Filtered<Q>`, so an
/// unfiltered query cannot reach execution and a filtered one cannot be
/// filtered again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered<Q> {
    query: Q,
}

impl<Q> Filtered<Q> {
    fn new(query: Q) -> Self {
        Self { query }
    }

    /// The rewritten query
    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Unwrap for hand-off to the execution collaborator
    pub fn into_query(self) -> Q {
        self.query
    }
}

struct RegistryInner<Q> {
    by_id: HashMap<FilterId, Arc<GlobalFilter<Q>>>,
    /// Filters per entity type, in registration order
    by_type: HashMap<String, Vec<Arc<GlobalFilter<Q>>>>,
}

/// Global registry of query filters with per-session resolution.
pub struct FilterRegistry<Q> {
    inner: RwLock<RegistryInner<Q>>,
    generation: AtomicU64,
    contexts: SessionContexts<Q>,
    sink: Option<Arc<dyn InvalidationSink>>,
    plan_cache: Option<Arc<dyn PlanCacheControl>>,
}

impl<Q> Default for FilterRegistry<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> FilterRegistry<Q> {
    /// Create an empty registry with no cache or collaborator wiring
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_id: HashMap::new(),
                by_type: HashMap::new(),
            }),
            generation: AtomicU64::new(0),
            contexts: SessionContexts::new(),
            sink: None,
            plan_cache: None,
        }
    }

    /// Wire the result cache so filter mutations invalidate correlated
    /// entries through their scope tags.
    pub fn with_invalidation(mut self, sink: Arc<dyn InvalidationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Wire the source's compiled-plan cache capability. Clearing plans after
    /// a filter change is best-effort; failures are logged, never propagated.
    pub fn with_plan_cache_control(mut self, control: Arc<dyn PlanCacheControl>) -> Self {
        self.plan_cache = Some(control);
        self
    }

    /// Current registry generation; moves on every mutation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Register a filter, or replace the filter already registered under the
    /// same identity.
    ///
    /// Replacement swaps the predicate and default-enabled state in place:
    /// the type-indexed list entry keeps its original position and is never
    /// duplicated. A replacement that moves the filter to a different entity
    /// type migrates the list entry and invalidates both types' cached
    /// results.
    ///
    /// Returns the filter's identity (generated when none is supplied).
    pub fn register<F>(
        &self,
        id: Option<FilterId>,
        entity_type: &str,
        predicate: F,
        default_enabled: bool,
    ) -> FilterId
    where
        F: Fn(Q) -> Q + Send + Sync + 'static,
    {
        let id = id.unwrap_or_else(FilterId::generate);
        let predicate: PredicateBuilder<Q> = Arc::new(predicate);
        let filter = Arc::new(GlobalFilter::new(
            id.clone(),
            entity_type,
            predicate,
            default_enabled,
        ));

        let mut stale_types = vec![entity_type.to_string()];
        {
            let mut inner = self.inner.write();
            match inner.by_id.insert(id.clone(), Arc::clone(&filter)) {
                Some(previous) if previous.entity_type() == entity_type => {
                    if let Some(list) = inner.by_type.get_mut(entity_type) {
                        if let Some(slot) = list.iter_mut().find(|f| f.id() == &id) {
                            *slot = Arc::clone(&filter);
                        }
                    }
                }
                Some(previous) => {
                    let old_type = previous.entity_type().to_string();
                    let emptied = inner.by_type.get_mut(&old_type).is_some_and(|list| {
                        list.retain(|f| f.id() != &id);
                        list.is_empty()
                    });
                    if emptied {
                        inner.by_type.remove(&old_type);
                    }
                    inner
                        .by_type
                        .entry(entity_type.to_string())
                        .or_default()
                        .push(filter);
                    stale_types.push(old_type);
                }
                None => {
                    inner
                        .by_type
                        .entry(entity_type.to_string())
                        .or_default()
                        .push(filter);
                }
            }
        }

        let generation = self.bump_generation();
        info!(
            filter_id = %id,
            entity_type,
            default_enabled,
            generation,
            "Registered global query filter"
        );

        for stale in &stale_types {
            self.invalidate_scope(stale);
            self.clear_compiled_plans(stale);
        }

        id
    }

    /// Look up a filter by identity; `None` for an unknown id
    pub fn filter(&self, id: &FilterId) -> Option<Arc<GlobalFilter<Q>>> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Filters registered for an entity type, in registration order,
    /// regardless of enabled state
    pub fn filters_for_type(&self, entity_type: &str) -> Vec<Arc<GlobalFilter<Q>>> {
        self.inner
            .read()
            .by_type
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of registered filters
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// True when no filters are registered
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    /// Resolve the filters active for a session and entity type.
    ///
    /// Filters come back in registration order; a filter is active when the
    /// session's override says so, or by its registration default when the
    /// session has none. The result is cached on the session context until
    /// the registry generation moves.
    pub fn resolve<S>(&self, session: &Arc<S>, entity_type: &str) -> Vec<Arc<GlobalFilter<Q>>>
    where
        S: Session + 'static,
    {
        let generation = self.generation();

        // Context state and registry state are read under separate locks;
        // cache_resolved rejects the result if the generation moved between.
        let (cached, overrides) = self.contexts.with_context(session, generation, |ctx| {
            ctx.refresh(generation);
            (ctx.cached(entity_type), ctx.overrides().clone())
        });
        if let Some(filters) = cached {
            return filters;
        }

        let active: Vec<Arc<GlobalFilter<Q>>> = {
            let inner = self.inner.read();
            inner.by_type.get(entity_type).map_or_else(Vec::new, |list| {
                list.iter()
                    .filter(|f| {
                        overrides
                            .get(f.id())
                            .copied()
                            .unwrap_or_else(|| f.default_enabled())
                    })
                    .cloned()
                    .collect()
            })
        };

        self.contexts.with_context(session, generation, |ctx| {
            ctx.refresh(self.generation());
            ctx.cache_resolved(generation, entity_type, active.clone());
        });
        active
    }

    /// Query rewriting hook, invoked by the pipeline immediately before
    /// execution.
    ///
    /// Applies every active filter for the session and entity type in
    /// registration order (logical AND: a record survives only if it
    /// satisfies every enabled predicate). With zero active filters the query
    /// passes through untouched; no predicate runs and no wrapper is added.
    pub fn apply_filters<S>(&self, session: &Arc<S>, entity_type: &str, query: Q) -> Filtered<Q>
    where
        S: Session + 'static,
    {
        let active = self.resolve(session, entity_type);
        if active.is_empty() {
            return Filtered::new(query);
        }

        let mut query = query;
        for filter in &active {
            query = filter.apply(query);
        }
        debug!(
            entity_type,
            applied = active.len(),
            "Applied global query filters"
        );
        Filtered::new(query)
    }

    /// No-op guard for queries that already passed through the pipeline.
    ///
    /// Accepting the token here lets call sites that cannot prove statically
    /// whether a query was filtered route it through the registry again
    /// without double application.
    pub fn reapply(&self, filtered: Filtered<Q>) -> Filtered<Q> {
        filtered
    }

    /// Set a session-level enable/disable override for one filter.
    ///
    /// Returns `false` without storing anything when the identity is
    /// unknown. A successful toggle invalidates the cached results scoped to
    /// the filter's entity type, since their meaning just changed for this
    /// process.
    pub fn set_session_override<S>(&self, session: &Arc<S>, id: &FilterId, enabled: bool) -> bool
    where
        S: Session + 'static,
    {
        let Some(entity_type) = self
            .inner
            .read()
            .by_id
            .get(id)
            .map(|f| f.entity_type().to_string())
        else {
            return false;
        };

        let generation = self.generation();
        self.contexts.with_context(session, generation, |ctx| {
            ctx.refresh(generation);
            ctx.set_override(id.clone(), enabled);
        });

        debug!(filter_id = %id, entity_type = %entity_type, enabled, "Session filter override set");
        self.invalidate_scope(&entity_type);
        true
    }

    /// Remove every registered filter.
    ///
    /// Cached results scoped to the previously filtered types are
    /// invalidated; session contexts rebuild (empty) on next access.
    pub fn clear_global_filters(&self) {
        let stale_types: Vec<String> = {
            let mut inner = self.inner.write();
            let types = inner.by_type.keys().cloned().collect();
            inner.by_id.clear();
            inner.by_type.clear();
            types
        };

        self.bump_generation();
        for stale in &stale_types {
            self.invalidate_scope(stale);
            self.clear_compiled_plans(stale);
        }
        info!(
            cleared_types = stale_types.len(),
            "Cleared all global query filters"
        );
    }

    /// Drop the filter context for one session; returns true when one existed
    pub fn clear_session_context(&self, session_id: Uuid) -> bool {
        self.contexts.remove(session_id)
    }

    /// Reset every live session context's resolved state, pruning dead ones
    pub fn clear_all_contexts(&self) {
        self.contexts.clear_all();
    }

    /// Drop contexts whose session is gone; returns the number removed
    pub fn prune_sessions(&self) -> usize {
        self.contexts.prune()
    }

    /// Number of tracked session contexts
    pub fn session_count(&self) -> usize {
        self.contexts.len()
    }

    fn invalidate_scope(&self, entity_type: &str) {
        if let Some(sink) = &self.sink {
            let removed = sink.invalidate_tag(&scope_tag(entity_type));
            if removed > 0 {
                debug!(
                    entity_type,
                    removed, "Invalidated cached results after filter change"
                );
            }
        }
    }

    fn clear_compiled_plans(&self, entity_type: &str) {
        if let Some(control) = &self.plan_cache {
            if let Err(e) = control.clear_compiled_plans(entity_type) {
                warn!(
                    entity_type,
                    error = %e,
                    "Compiled-plan cache clear failed after filter change"
                );
            }
        }
    }
}

impl<Q> std::fmt::Debug for FilterRegistry<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.len())
            .field("generation", &self.generation())
            .field("sessions", &self.session_count())
            .finish()
    }
}
