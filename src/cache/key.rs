//! Deterministic cache key derivation
//!
//! A key is a fingerprint of the query's structural shape combined with the
//! caller-supplied tag list. The same (shape, tags) pair always produces the
//! same key, across threads and across process runs; structurally different
//! queries or different tag lists produce different keys with overwhelming
//! probability.
//!
//! Tag order is significant for key derivation (callers asking for the same
//! query under reordered tags get distinct entries) but immaterial for
//! invalidation, which operates per tag.

use crate::cache::errors::{CacheError, CacheResult};
use crate::query::QueryShape;
use sha2::{Digest, Sha256};

/// Fingerprint identifying a cacheable query + tag combination.
///
/// Rendered as `{entity_type}:{hex_digest}` so log lines stay greppable by
/// entity type while the digest carries the full structural identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// The rendered key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a query and its tag list.
///
/// Every field is length-framed before hashing so adjacent fields cannot
/// collide across boundaries (`["ab", "c"]` never hashes like `["a", "bc"]`).
/// Shape failures surface as [`CacheError::KeyDerivation`] before any
/// population attempt.
pub fn derive_key<Q: QueryShape>(query: &Q, tags: &[impl AsRef<str>]) -> CacheResult<CacheKey> {
    let shape = query
        .shape()
        .map_err(|e| CacheError::KeyDerivation(e.to_string()))?;

    let mut hasher = Sha256::new();
    frame(&mut hasher, query.entity_type().as_bytes());
    frame(&mut hasher, shape.as_bytes());
    for tag in tags {
        frame(&mut hasher, tag.as_ref().as_bytes());
    }

    let digest = hasher.finalize();
    Ok(CacheKey(format!(
        "{}:{}",
        query.entity_type(),
        hex::encode(digest)
    )))
}

fn frame(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryResult;
    use proptest::prelude::*;

    #[derive(Clone)]
    struct ShapedQuery {
        entity: String,
        shape: String,
    }

    impl ShapedQuery {
        fn new(entity: &str, shape: &str) -> Self {
            Self {
                entity: entity.to_string(),
                shape: shape.to_string(),
            }
        }
    }

    impl QueryShape for ShapedQuery {
        fn entity_type(&self) -> &str {
            &self.entity
        }

        fn shape(&self) -> QueryResult<String> {
            Ok(self.shape.clone())
        }
    }

    struct UnshapeableQuery;

    impl QueryShape for UnshapeableQuery {
        fn entity_type(&self) -> &str {
            "orders"
        }

        fn shape(&self) -> QueryResult<String> {
            Err(crate::query::QueryError::UnsupportedShape(
                "opaque predicate".to_string(),
            ))
        }
    }

    #[test]
    fn test_same_query_and_tags_same_key() {
        let query = ShapedQuery::new("orders", "where:active=true;order:id");
        let key1 = derive_key(&query, &["orders", "active"]).unwrap();
        let key2 = derive_key(&query, &["orders", "active"]).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_different_shape_different_key() {
        let a = ShapedQuery::new("orders", "where:active=true");
        let b = ShapedQuery::new("orders", "where:active=false");
        assert_ne!(
            derive_key(&a, &["orders"]).unwrap(),
            derive_key(&b, &["orders"]).unwrap()
        );
    }

    #[test]
    fn test_different_tags_different_key() {
        let query = ShapedQuery::new("orders", "all");
        assert_ne!(
            derive_key(&query, &["a"]).unwrap(),
            derive_key(&query, &["b"]).unwrap()
        );
    }

    #[test]
    fn test_tag_order_is_significant() {
        let query = ShapedQuery::new("orders", "all");
        assert_ne!(
            derive_key(&query, &["a", "b"]).unwrap(),
            derive_key(&query, &["b", "a"]).unwrap()
        );
    }

    #[test]
    fn test_field_framing_prevents_boundary_collisions() {
        let query = ShapedQuery::new("orders", "all");
        assert_ne!(
            derive_key(&query, &["ab", "c"]).unwrap(),
            derive_key(&query, &["a", "bc"]).unwrap()
        );
    }

    #[test]
    fn test_key_is_prefixed_with_entity_type() {
        let query = ShapedQuery::new("orders", "all");
        let key = derive_key(&query, &["orders"]).unwrap();
        assert!(key.as_str().starts_with("orders:"));
    }

    #[test]
    fn test_unsupported_shape_is_a_key_derivation_error() {
        let err = derive_key(&UnshapeableQuery, &["orders"]).unwrap_err();
        assert!(matches!(err, CacheError::KeyDerivation(_)));
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(
            entity in "[a-z]{1,12}",
            shape in ".{0,64}",
            tags in proptest::collection::vec("[a-z0-9]{0,16}", 0..4),
        ) {
            let query = ShapedQuery::new(&entity, &shape);
            let first = derive_key(&query, &tags).unwrap();
            let second = derive_key(&query, &tags).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_distinct_shapes_do_not_collide(
            entity in "[a-z]{1,12}",
            shape_a in "[a-z]{1,32}",
            shape_b in "[a-z]{1,32}",
        ) {
            prop_assume!(shape_a != shape_b);
            let a = ShapedQuery::new(&entity, &shape_a);
            let b = ShapedQuery::new(&entity, &shape_b);
            let tags: Vec<String> = vec![];
            prop_assert_ne!(derive_key(&a, &tags).unwrap(), derive_key(&b, &tags).unwrap());
        }
    }
}
