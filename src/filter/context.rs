//! # Session Filter Contexts
//!
//! Per-session derived state for the filter registry, held in a non-owning
//! side table keyed by the session's stable identity.
//!
//! The table stores only a [`Weak`] liveness probe per session; it never
//! holds a strong reference back, so a context cannot extend its session's
//! lifetime. Dead entries are dropped opportunistically when a new context is
//! created and explicitly by [`SessionContexts::prune`].

use crate::filter::types::{FilterId, GlobalFilter};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

/// The external consumer context queries are scoped to.
///
/// The core only needs a stable identity for the side-table key; liveness is
/// tracked through the `Arc` the host already holds.
pub trait Session: Send + Sync {
    /// Stable identity of this session
    fn session_id(&self) -> Uuid;
}

/// Derived filter state for one session.
///
/// Holds the registry generation it was resolved against, the session's
/// explicit per-filter overrides, and a per-type cache of resolved filter
/// lists. The resolved cache is rebuilt lazily whenever the registry
/// generation moves; overrides survive rebuilds.
pub(crate) struct SessionFilterContext<Q> {
    generation: u64,
    overrides: HashMap<FilterId, bool>,
    resolved: HashMap<String, Vec<Arc<GlobalFilter<Q>>>>,
}

impl<Q> SessionFilterContext<Q> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            overrides: HashMap::new(),
            resolved: HashMap::new(),
        }
    }

    /// Drop the resolved cache if the registry has moved past the generation
    /// this context was last resolved against.
    pub fn refresh(&mut self, generation: u64) {
        if self.generation != generation {
            self.resolved.clear();
            self.generation = generation;
        }
    }

    /// The session's explicit overrides, by filter identity
    pub fn overrides(&self) -> &HashMap<FilterId, bool> {
        &self.overrides
    }

    /// Set an explicit enable/disable override for one filter
    pub fn set_override(&mut self, id: FilterId, enabled: bool) {
        self.overrides.insert(id, enabled);
        self.resolved.clear();
    }

    /// Resolved filter list for an entity type, if still cached
    pub fn cached(&self, entity_type: &str) -> Option<Vec<Arc<GlobalFilter<Q>>>> {
        self.resolved.get(entity_type).cloned()
    }

    /// Cache a resolved filter list, unless the registry moved on while it
    /// was being computed.
    pub fn cache_resolved(
        &mut self,
        generation: u64,
        entity_type: &str,
        filters: Vec<Arc<GlobalFilter<Q>>>,
    ) {
        if self.generation == generation {
            self.resolved.insert(entity_type.to_string(), filters);
        }
    }

    /// Drop the resolved cache, keeping overrides
    pub fn clear_resolved(&mut self) {
        self.resolved.clear();
    }
}

struct SessionEntry<Q> {
    probe: Weak<dyn Session>,
    context: Mutex<SessionFilterContext<Q>>,
}

/// Non-owning side table associating sessions with their filter contexts.
pub(crate) struct SessionContexts<Q> {
    entries: DashMap<Uuid, SessionEntry<Q>>,
}

impl<Q> SessionContexts<Q> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Run `f` against the session's context, creating the context lazily on
    /// first access. Creation opportunistically prunes dead sessions so the
    /// table tracks the live session population without explicit teardown.
    pub fn with_context<S, R>(
        &self,
        session: &Arc<S>,
        generation: u64,
        f: impl FnOnce(&mut SessionFilterContext<Q>) -> R,
    ) -> R
    where
        S: Session + 'static,
    {
        let id = session.session_id();
        if !self.entries.contains_key(&id) {
            self.prune();
        }

        let session_dyn: Arc<dyn Session> = session.clone();
        let probe: Weak<dyn Session> = Arc::downgrade(&session_dyn);
        let entry = self.entries.entry(id).or_insert_with(|| SessionEntry {
            probe,
            context: Mutex::new(SessionFilterContext::new(generation)),
        });
        let mut context = entry.context.lock();
        f(&mut context)
    }

    /// Remove the context for one session; returns true when one existed
    pub fn remove(&self, session_id: Uuid) -> bool {
        self.entries.remove(&session_id).is_some()
    }

    /// Reset the resolved cache of every live context, pruning dead ones
    pub fn clear_all(&self) {
        self.entries.retain(|_, entry| {
            if entry.probe.strong_count() == 0 {
                return false;
            }
            entry.context.lock().clear_resolved();
            true
        });
    }

    /// Drop entries whose session is no longer referenced anywhere else;
    /// returns the number removed.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.probe.strong_count() > 0);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "Pruned filter contexts for dead sessions");
        }
        removed
    }

    /// Number of tracked contexts (dead-but-unpruned entries included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
