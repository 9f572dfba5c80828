//! Cache entry representation: values, expiration policies, bookkeeping

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// A materialized result as stored by the cache.
///
/// `Missing` is the sentinel for a legitimately absent result: the population
/// ran and found nothing. A later lookup of the same key is still a cache hit
/// returning `Missing`, never a miss that re-populates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue<V> {
    /// The query materialized a value
    Found(V),
    /// The query legitimately produced no value
    Missing,
}

impl<V> CachedValue<V> {
    /// Wrap an execution result
    pub fn from_option(value: Option<V>) -> Self {
        match value {
            Some(v) => Self::Found(v),
            None => Self::Missing,
        }
    }

    /// Unwrap back into the caller-facing optional result
    pub fn into_option(self) -> Option<V> {
        match self {
            Self::Found(v) => Some(v),
            Self::Missing => None,
        }
    }

    /// True when this is the absent-result sentinel
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Per-entry expiration policy, evaluated by the store.
///
/// Reads never return an expired entry (lazy evaluation); a sweep removes
/// expired entries nobody re-reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// The entry lives until invalidated
    Never,
    /// The entry expires at a fixed wall-clock instant
    AbsoluteAt(DateTime<Utc>),
    /// The entry expires after going unread for the given duration
    SlidingTtl(Duration),
}

impl ExpirationPolicy {
    /// Absolute expiration a duration from now
    pub fn absolute_from_now(ttl: Duration) -> Self {
        let deadline = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::AbsoluteAt(deadline)
    }
}

/// Entry stored in the cache
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    /// Materialized result or the absent-result sentinel
    pub value: CachedValue<V>,
    /// Expiration policy for this entry
    pub policy: ExpirationPolicy,
    /// Last read or write, drives sliding expiration
    pub last_accessed: Instant,
    /// Originating tags, retained to clean the reverse index on removal
    pub tags: Vec<String>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: CachedValue<V>, policy: ExpirationPolicy, tags: Vec<String>) -> Self {
        Self {
            value,
            policy,
            last_accessed: Instant::now(),
            tags,
        }
    }

    /// Check whether the entry has expired under its policy
    pub fn is_expired(&self) -> bool {
        match self.policy {
            ExpirationPolicy::Never => false,
            ExpirationPolicy::AbsoluteAt(at) => Utc::now() >= at,
            ExpirationPolicy::SlidingTtl(ttl) => self.last_accessed.elapsed() > ttl,
        }
    }

    /// Record a read, extending sliding windows
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}
