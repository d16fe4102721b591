//! Tests for the request-scoped document cache.

use super::*;
use crate::document::ConfigMap;
use crate::key::EntityRef;

fn document(entity_type: &str, entity_id: &str) -> ConfigDocument {
    ConfigDocument::for_entity(&EntityRef::new(entity_type, entity_id), ConfigMap::new())
}

#[test]
fn test_new_cache_misses_everything() {
    let cache = DocumentCache::new();
    assert!(cache.is_empty());
    assert_eq!(
        cache.lookup(&DocumentKey::for_entity("user", "1")),
        CacheLookup::Miss
    );
}

#[test]
fn test_from_fetch_records_found_and_missing_keys() {
    let found = DocumentKey::for_entity("user", "1");
    let missing = DocumentKey::for_entity("user", "2");
    let requested = vec![found.clone(), missing.clone()];

    let cache = DocumentCache::from_fetch(&requested, vec![document("user", "1")]);

    assert_eq!(cache.len(), 2);
    assert!(matches!(cache.lookup(&found), CacheLookup::Found(doc) if doc.key == found));
    assert_eq!(cache.lookup(&missing), CacheLookup::KnownMissing);
    assert_eq!(
        cache.lookup(&DocumentKey::for_entity("user", "3")),
        CacheLookup::Miss
    );
}

#[test]
fn test_insert_overrides_placeholder() {
    let key = DocumentKey::for_entity("user", "1");
    let mut cache = DocumentCache::from_fetch(&[key.clone()], Vec::new());
    assert_eq!(cache.lookup(&key), CacheLookup::KnownMissing);

    cache.insert(key.clone(), Some(document("user", "1")));
    assert!(matches!(cache.lookup(&key), CacheLookup::Found(_)));
}

#[test]
fn test_duplicate_requested_keys_are_cached_once() {
    let key = DocumentKey::for_entity("organization", "acme");
    let cache = DocumentCache::from_fetch(&[key.clone(), key.clone()], Vec::new());
    assert_eq!(cache.len(), 1);
}
