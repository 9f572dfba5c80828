//! Integration tests for the global filter registry: predicate composition,
//! per-session overrides, weak session contexts, and the correlated cache
//! invalidation that keeps filtered query results fresh.

mod common;

use common::{OrderSource, RangeQuery, TestSession};
use querykit_core::cache::{CachedSource, ExpirationPolicy, InvalidationSink, ResultCache};
use querykit_core::filter::{FilterRegistry, Session};
use querykit_core::query::{PlanCacheControl, QueryResult};
use querykit_core::CacheConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn order_registry() -> FilterRegistry<RangeQuery> {
    FilterRegistry::new()
}

#[test]
fn test_enabled_filters_compose_by_intersection() {
    let registry = order_registry();
    let session = TestSession::new();

    // F1: x > 5, F2: x < 10
    registry.register(
        Some("above-five".into()),
        "orders",
        |q: RangeQuery| RangeQuery {
            min: q.min.max(6),
            ..q
        },
        true,
    );
    registry.register(
        Some("below-ten".into()),
        "orders",
        |q: RangeQuery| RangeQuery {
            max: q.max.min(9),
            ..q
        },
        true,
    );

    let filtered = registry.apply_filters(&session, "orders", RangeQuery::all());
    assert_eq!(filtered.into_query(), RangeQuery::between(6, 9));
}

#[test]
fn test_disabling_one_filter_for_a_session_narrows_composition() {
    let registry = order_registry();
    let session = TestSession::new();

    registry.register(
        Some("above-five".into()),
        "orders",
        |q: RangeQuery| RangeQuery {
            min: q.min.max(6),
            ..q
        },
        true,
    );
    registry.register(
        Some("below-ten".into()),
        "orders",
        |q: RangeQuery| RangeQuery {
            max: q.max.min(9),
            ..q
        },
        true,
    );

    assert!(registry.set_session_override(&session, &"below-ten".into(), false));
    let filtered = registry.apply_filters(&session, "orders", RangeQuery::all());
    assert_eq!(filtered.into_query(), RangeQuery::between(6, i64::MAX));

    // A fresh session is unaffected by the override
    let other = TestSession::new();
    let filtered = registry.apply_filters(&other, "orders", RangeQuery::all());
    assert_eq!(filtered.into_query(), RangeQuery::between(6, 9));
}

#[test]
fn test_unfiltered_type_returns_the_query_untouched() {
    let registry = order_registry();
    let session = TestSession::new();
    let invocations = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&invocations);
    registry.register(
        Some("counted".into()),
        "orders",
        move |q: RangeQuery| {
            counter.fetch_add(1, Ordering::SeqCst);
            q
        },
        false,
    );

    let original = RangeQuery::between(3, 7);
    let filtered = registry.apply_filters(&session, "orders", original.clone());

    // No predicate ran and the query came back bit-identical
    assert_eq!(filtered.into_query(), original);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[test]
fn test_contexts_vanish_with_their_sessions() {
    let registry = order_registry();
    registry.register(Some("f".into()), "orders", |q: RangeQuery| q, true);

    let session = TestSession::new();
    registry.apply_filters(&session, "orders", RangeQuery::all());
    assert_eq!(registry.session_count(), 1);

    drop(session);
    assert_eq!(registry.prune_sessions(), 1);
    assert_eq!(registry.session_count(), 0);
}

/// A filter registration invalidates exactly the cache entries whose meaning
/// it changed, through the entity type's scope tag.
#[test]
fn test_filter_registration_invalidates_correlated_cache_entries() {
    querykit_core::logging::init_structured_logging();

    let source = OrderSource::with_rows(vec![1, 5, 9]);
    let cache = Arc::new(ResultCache::new(CacheConfig::for_test()));
    let cached = CachedSource::new(Arc::clone(&source), Arc::clone(&cache));
    let registry: FilterRegistry<RangeQuery> =
        FilterRegistry::new().with_invalidation(Arc::clone(&cache) as Arc<dyn InvalidationSink>);

    // Register an "active orders" filter, then cache a query result
    registry.register(
        Some("active".into()),
        "orders",
        |q: RangeQuery| RangeQuery {
            min: q.min.max(0),
            ..q
        },
        true,
    );
    cached
        .from_cache(&RangeQuery::all(), &["orders"], ExpirationPolicy::Never)
        .unwrap();
    assert_eq!(source.executions(), 1);

    // A second registration for the same type changes what queries mean;
    // the cached pre-change result must not be served again
    registry.register(
        Some("recent".into()),
        "orders",
        |q: RangeQuery| RangeQuery {
            max: q.max.min(100),
            ..q
        },
        true,
    );
    assert!(cache.is_empty());

    cached
        .from_cache(&RangeQuery::all(), &["orders"], ExpirationPolicy::Never)
        .unwrap();
    assert_eq!(source.executions(), 2);
}

#[test]
fn test_session_override_toggle_invalidates_the_scope_tag() {
    let source = OrderSource::with_rows(vec![2]);
    let cache = Arc::new(ResultCache::new(CacheConfig::for_test()));
    let cached = CachedSource::new(Arc::clone(&source), Arc::clone(&cache));
    let registry: FilterRegistry<RangeQuery> =
        FilterRegistry::new().with_invalidation(Arc::clone(&cache) as Arc<dyn InvalidationSink>);
    let session = TestSession::new();

    registry.register(Some("f".into()), "orders", |q: RangeQuery| q, true);
    cached
        .from_cache(&RangeQuery::all(), &["orders"], ExpirationPolicy::Never)
        .unwrap();
    assert_eq!(cache.len(), 1);

    assert!(registry.set_session_override(&session, &"f".into(), false));
    assert!(cache.is_empty());
}

#[test]
fn test_clearing_global_filters_invalidates_affected_types() {
    let source = OrderSource::with_rows(vec![2]);
    let cache = Arc::new(ResultCache::new(CacheConfig::for_test()));
    let cached = CachedSource::new(Arc::clone(&source), Arc::clone(&cache));
    let registry: FilterRegistry<RangeQuery> =
        FilterRegistry::new().with_invalidation(Arc::clone(&cache) as Arc<dyn InvalidationSink>);

    registry.register(Some("f".into()), "orders", |q: RangeQuery| q, true);
    cached
        .from_cache(&RangeQuery::all(), &["orders"], ExpirationPolicy::Never)
        .unwrap();

    registry.clear_global_filters();
    assert!(registry.is_empty());
    assert!(cache.is_empty());
}

/// Records which entity types the source was asked to drop compiled plans for
struct RecordingPlanCache {
    cleared: Mutex<Vec<String>>,
}

impl PlanCacheControl for RecordingPlanCache {
    fn clear_compiled_plans(&self, entity_type: &str) -> QueryResult<()> {
        self.cleared.lock().push(entity_type.to_string());
        Ok(())
    }
}

#[test]
fn test_registration_clears_compiled_plans_for_the_type() {
    let control = Arc::new(RecordingPlanCache {
        cleared: Mutex::new(Vec::new()),
    });
    let registry: FilterRegistry<RangeQuery> = FilterRegistry::new()
        .with_plan_cache_control(Arc::clone(&control) as Arc<dyn PlanCacheControl>);

    registry.register(Some("f".into()), "orders", |q: RangeQuery| q, true);
    assert_eq!(*control.cleared.lock(), vec!["orders".to_string()]);
}

#[test]
fn test_filters_survive_sessions_and_apply_to_new_ones() {
    let registry = order_registry();

    {
        let short_lived = TestSession::new();
        registry.register(
            Some("above-five".into()),
            "orders",
            |q: RangeQuery| RangeQuery {
                min: q.min.max(6),
                ..q
            },
            true,
        );
        registry.apply_filters(&short_lived, "orders", RangeQuery::all());
    }
    registry.prune_sessions();

    // The registry kept the filter; only the session context died
    let fresh = TestSession::new();
    let filtered = registry.apply_filters(&fresh, "orders", RangeQuery::all());
    assert_eq!(filtered.into_query(), RangeQuery::between(6, i64::MAX));
}

#[test]
fn test_clear_session_context_drops_overrides() {
    let registry = order_registry();
    let session = TestSession::new();

    registry.register(Some("f".into()), "orders", |q: RangeQuery| q, false);
    assert!(registry.set_session_override(&session, &"f".into(), true));
    assert_eq!(registry.resolve(&session, "orders").len(), 1);

    assert!(registry.clear_session_context(session.session_id()));

    // With the context gone the registration default applies again
    assert!(registry.resolve(&session, "orders").is_empty());
}
