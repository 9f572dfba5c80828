//! Shared fixtures for integration tests
#![allow(dead_code)] // Not every test binary uses every fixture

use querykit_core::filter::Session;
use querykit_core::query::{QueryError, QueryResult, QueryShape, QuerySource};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Inclusive range query over integer order rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub min: i64,
    pub max: i64,
}

impl RangeQuery {
    pub fn all() -> Self {
        Self {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    pub fn between(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl QueryShape for RangeQuery {
    fn entity_type(&self) -> &str {
        "orders"
    }

    fn shape(&self) -> QueryResult<String> {
        Ok(format!("range:{}..{}", self.min, self.max))
    }
}

/// In-memory order store that counts executions and can fail on demand
pub struct OrderSource {
    rows: Vec<i64>,
    executions: AtomicUsize,
    fail_next: AtomicBool,
}

impl OrderSource {
    pub fn with_rows(rows: Vec<i64>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            executions: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        })
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Make the next execution fail with a transient error
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl QuerySource for OrderSource {
    type Query = RangeQuery;
    type Value = Vec<i64>;

    fn execute(&self, query: &RangeQuery) -> QueryResult<Option<Vec<i64>>> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(QueryError::Execution("connection reset".to_string()));
        }

        let matched: Vec<i64> = self
            .rows
            .iter()
            .copied()
            .filter(|row| (query.min..=query.max).contains(row))
            .collect();
        if matched.is_empty() {
            Ok(None)
        } else {
            Ok(Some(matched))
        }
    }
}

/// Minimal session fixture: a stable identity and nothing else
pub struct TestSession {
    id: Uuid,
}

impl TestSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { id: Uuid::new_v4() })
    }
}

impl Session for TestSession {
    fn session_id(&self) -> Uuid {
        self.id
    }
}
