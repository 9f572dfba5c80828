//! # Cached Query Surface
//!
//! [`CachedSource`] couples an external [`QuerySource`] with a
//! [`ResultCache`]: callers hand it a query and a tag list and get the
//! materialized result, from cache when possible.
//!
//! Every entry cached here additionally carries the filter scope tag for the
//! query's entity type, so filter-registry mutations can invalidate exactly
//! the entries they affect (see [`crate::filter::FilterRegistry`]).

use crate::cache::entry::ExpirationPolicy;
use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::key::derive_key;
use crate::cache::store::ResultCache;
use crate::cache::tags::scope_tag;
use crate::query::{QueryShape, QuerySource};
use std::sync::Arc;

/// Caching front for a queryable data source
pub struct CachedSource<S: QuerySource> {
    source: Arc<S>,
    cache: Arc<ResultCache<S::Value>>,
}

impl<S: QuerySource> CachedSource<S> {
    /// Couple a source with a result cache
    pub fn new(source: Arc<S>, cache: Arc<ResultCache<S::Value>>) -> Self {
        Self { source, cache }
    }

    /// The underlying result cache
    pub fn cache(&self) -> &Arc<ResultCache<S::Value>> {
        &self.cache
    }

    /// Return the query's result from the cache, materializing and caching it
    /// on first use.
    ///
    /// The key derives from the query's structural shape and the tag list in
    /// caller order; derivation failures surface before any execution. A
    /// legitimately absent result (`Ok(None)`) is cached and returned as a
    /// hit on subsequent calls.
    pub fn from_cache(
        &self,
        query: &S::Query,
        tags: &[&str],
        policy: ExpirationPolicy,
    ) -> CacheResult<Option<S::Value>> {
        let key = derive_key(query, tags)?;
        let all_tags = self.storage_tags(query, tags);
        let source = Arc::clone(&self.source);

        let value = self.cache.get_or_add(&key, &all_tags, policy, || {
            source.execute(query).map_err(CacheError::from)
        })?;
        Ok(value.into_option())
    }

    /// Remove every cached entry carrying the tag
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.cache.invalidate_tag(tag)
    }

    /// Remove every cached entry
    pub fn clear_all(&self) {
        self.cache.clear_all();
    }

    fn storage_tags(&self, query: &S::Query, tags: &[&str]) -> Vec<String> {
        let mut all: Vec<String> = tags.iter().map(|t| (*t).to_string()).collect();
        all.push(scope_tag(query.entity_type()));
        all
    }
}

impl<S> CachedSource<S>
where
    S: QuerySource + 'static,
    S::Query: Send + 'static,
    S::Value: Send + 'static,
{
    /// Asynchronous variant of [`CachedSource::from_cache`].
    ///
    /// Identical contract; the (possibly blocking) execution runs on a
    /// blocking-capable worker and the caller awaits the result. Under
    /// concurrent calls for the same key, at most one materialization is
    /// retained and all callers observe it.
    pub async fn from_cache_async(
        &self,
        query: S::Query,
        tags: Vec<String>,
        policy: ExpirationPolicy,
    ) -> CacheResult<Option<S::Value>> {
        let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        let key = derive_key(&query, &tag_refs)?;
        let all_tags = self.storage_tags(&query, &tag_refs);
        let source = Arc::clone(&self.source);

        let value = self
            .cache
            .get_or_add_async(&key, &all_tags, policy, move || {
                source.execute(&query).map_err(CacheError::from)
            })
            .await?;
        Ok(value.into_option())
    }
}

impl<S: QuerySource> Clone for CachedSource<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
        }
    }
}
