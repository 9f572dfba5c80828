//! Tag helpers shared by the cache and filter subsystems

/// Reserved tag prefix for internal correlation tags.
///
/// Caller-supplied tags starting with this prefix would collide with the
/// filter correlation machinery; `scope_tag` is the only producer.
pub(crate) const SCOPE_TAG_PREFIX: &str = "filters:";

/// Internal tag correlating cached entries to the filters that shaped them.
///
/// Every entry cached through [`CachedSource`](crate::cache::CachedSource)
/// carries the scope tag of its query's entity type, so a filter change for
/// that type can invalidate exactly the affected entries without folding
/// filter state into the cache key.
pub fn scope_tag(entity_type: &str) -> String {
    format!("{SCOPE_TAG_PREFIX}{entity_type}")
}
