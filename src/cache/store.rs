//! # Result Cache Store
//!
//! Thread-safe key→value store for materialized query results with a
//! secondary tag→keys index for bulk invalidation.
//!
//! ## Architecture
//!
//! The entry store and the tag index live behind a single `RwLock`, so the
//! cross-index invariant is maintained atomically: every live key appears
//! under all of its originating tags, and a removed key disappears from every
//! tag's set in the same critical section. Population callbacks always run
//! outside the lock.
//!
//! ## Race Resolution
//!
//! Concurrent `get_or_add` calls for the same key may each run their own
//! population, but only one value is retained: the first writer wins, and a
//! losing writer discards its own result in favor of the winner's. Callers
//! therefore always observe a single consistent value per key.
//!
//! ## Expiration
//!
//! Policies are evaluated lazily at read time (an expired entry reads as a
//! miss and is dropped in place) and by [`ResultCache::expire_stale`], which
//! can run on a periodic tokio task via [`ResultCache::start_sweeper`].

use crate::cache::entry::{CacheEntry, CachedValue, ExpirationPolicy};
use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::key::CacheKey;
use crate::config::CacheConfig;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Statistics for cache performance monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStats {
    /// Record a cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a policy-driven expiration
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record entries removed by explicit invalidation
    pub fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    /// Get hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get expiration count
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Get invalidation count
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}

/// Seam through which the filter registry invalidates correlated entries.
///
/// The registry never sees the cache's value type; it only needs tag-scoped
/// invalidation and a full clear.
pub trait InvalidationSink: Send + Sync {
    /// Remove every entry indexed under the tag; returns the number removed
    fn invalidate_tag(&self, tag: &str) -> usize;

    /// Remove every entry
    fn clear_all(&self);
}

struct CacheInner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    tags: HashMap<String, HashSet<CacheKey>>,
}

impl<V> CacheInner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    /// Register a key under every tag in the list
    fn index_tags(&mut self, key: &CacheKey, tags: &[String]) {
        for tag in tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
    }

    /// Remove an entry and scrub it from every tag bucket it was indexed
    /// under, dropping buckets that become empty.
    fn remove_entry(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(bucket) = self.tags.get_mut(tag) {
                bucket.remove(key);
                if bucket.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(entry)
    }
}

/// Thread-safe result cache with tag-based bulk invalidation.
///
/// Synchronous and asynchronous call paths yield identical outcomes; the
/// async variant only changes where the population callback runs.
pub struct ResultCache<V> {
    inner: RwLock<CacheInner<V>>,
    config: CacheConfig,
    stats: CacheStats,
}

impl<V: Clone> ResultCache<V> {
    /// Create a cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: RwLock::new(CacheInner::new()),
            config,
            stats: CacheStats::default(),
        }
    }

    /// Create a cache with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Look up a key.
    ///
    /// Returns the stored value on a hit, including the absent-result
    /// sentinel. An expired entry reads as a miss and is removed in place.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue<V>> {
        if !self.config.enabled {
            return None;
        }

        let mut inner = self.inner.write();
        match inner.entries.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                inner.remove_entry(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                debug!(key = %key, "Cache MISS (expired)");
                None
            }
            Some(entry) => {
                entry.touch();
                let value = entry.value.clone();
                self.stats.record_hit();
                debug!(key = %key, "Cache HIT");
                Some(value)
            }
            None => {
                self.stats.record_miss();
                debug!(key = %key, "Cache MISS");
                None
            }
        }
    }

    /// Insert a value, reconciling with a concurrent winner.
    ///
    /// If a live entry already exists for the key, the existing value is
    /// returned and the offered one is discarded; otherwise the offered value
    /// is stored and returned. Either way the key is registered under every
    /// tag, so a losing writer cannot leave the index short.
    ///
    /// When caching is disabled the offered value passes straight through.
    pub fn insert_or_get(
        &self,
        key: CacheKey,
        value: CachedValue<V>,
        policy: ExpirationPolicy,
        tags: &[String],
    ) -> CachedValue<V> {
        if !self.config.enabled {
            return value;
        }

        let mut inner = self.inner.write();
        match inner.entries.get_mut(&key) {
            Some(existing) if !existing.is_expired() => {
                existing.touch();
                let winner = existing.value.clone();
                inner.index_tags(&key, tags);
                debug!(key = %key, "Cache populate race lost; keeping existing value");
                winner
            }
            _ => {
                inner.entries.insert(
                    key.clone(),
                    CacheEntry::new(value.clone(), policy, tags.to_vec()),
                );
                inner.index_tags(&key, tags);
                debug!(key = %key, tag_count = tags.len(), "Cache SET");
                value
            }
        }
    }

    /// Get-or-populate protocol.
    ///
    /// A hit (including the absent-result sentinel) never invokes `populate`.
    /// On a miss, `populate` runs outside any lock; a failure propagates and
    /// nothing is cached, so the next call retries. The stored outcome is
    /// reconciled through [`ResultCache::insert_or_get`].
    pub fn get_or_add<F>(
        &self,
        key: &CacheKey,
        tags: &[String],
        policy: ExpirationPolicy,
        populate: F,
    ) -> CacheResult<CachedValue<V>>
    where
        F: FnOnce() -> CacheResult<Option<V>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let produced = populate()?;
        Ok(self.insert_or_get(key.clone(), CachedValue::from_option(produced), policy, tags))
    }

    /// Asynchronous variant of [`ResultCache::get_or_add`].
    ///
    /// The population callback is handed to a blocking-capable worker so the
    /// caller's scheduling thread is never blocked while the external
    /// collaborator materializes. The contract is otherwise identical: at
    /// most one value is retained per key under a concurrent race, and every
    /// caller settles on a consistent value.
    pub async fn get_or_add_async<F>(
        &self,
        key: &CacheKey,
        tags: &[String],
        policy: ExpirationPolicy,
        populate: F,
    ) -> CacheResult<CachedValue<V>>
    where
        F: FnOnce() -> CacheResult<Option<V>> + Send + 'static,
        V: Send + 'static,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let produced = tokio::task::spawn_blocking(populate)
            .await
            .map_err(|e| CacheError::TaskJoin(e.to_string()))??;

        Ok(self.insert_or_get(key.clone(), CachedValue::from_option(produced), policy, tags))
    }

    /// Remove every entry indexed under the tag.
    ///
    /// Removed keys are scrubbed from every other tag's set as well; the
    /// index never retains dangling keys or orphaned buckets.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut inner = self.inner.write();
        let Some(keys) = inner.tags.remove(tag) else {
            return 0;
        };

        let mut removed = 0;
        for key in keys {
            if inner.remove_entry(&key).is_some() {
                removed += 1;
            }
        }

        self.stats.record_invalidations(removed as u64);
        debug!(tag = tag, removed = removed, "Cache tag invalidated");
        removed
    }

    /// Remove a single entry by key
    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        let removed = self.inner.write().remove_entry(key).is_some();
        if removed {
            self.stats.record_invalidations(1);
        }
        removed
    }

    /// Remove every entry and tag bucket
    pub fn clear_all(&self) {
        let mut inner = self.inner.write();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.tags.clear();
        self.stats.record_invalidations(removed as u64);
        info!(removed = removed, "Cache cleared");
    }

    /// Remove entries whose policy has expired; returns the number removed
    pub fn expire_stale(&self) -> usize {
        let mut inner = self.inner.write();
        let expired: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove_entry(key);
            self.stats.record_expiration();
        }

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Cache sweep removed stale entries");
        }
        expired.len()
    }

    /// Current number of live entries (expired-but-unswept entries included)
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Number of keys currently indexed under a tag
    pub fn tagged_len(&self, tag: &str) -> usize {
        self.inner.read().tags.get(tag).map_or(0, HashSet::len)
    }
}

impl<V> ResultCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Start a periodic background sweep at the configured cleanup interval.
    ///
    /// The task holds only a weak handle and exits once the cache is dropped.
    pub fn start_sweeper(cache: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = cache.config.cleanup_interval();
        let weak: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.expire_stale();
                    }
                    None => break,
                }
            }
        })
    }
}

impl<V: Clone> std::fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.config.enabled)
            .field("entries", &self.len())
            .finish()
    }
}

impl<V> InvalidationSink for ResultCache<V>
where
    V: Clone + Send + Sync,
{
    fn invalidate_tag(&self, tag: &str) -> usize {
        ResultCache::invalidate_tag(self, tag)
    }

    fn clear_all(&self) {
        ResultCache::clear_all(self);
    }
}
