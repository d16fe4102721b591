//! End-to-end tests for resolution and writes.
//!
//! These tests drive the public manager against the in-memory store with a
//! three-level hierarchy: users inherit from their team, teams inherit from
//! their organization, and organizations inherit from the default.

use crate::*;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn config(value: Value) -> ConfigMap {
    value.as_object().cloned().expect("config must be an object")
}

/// User ids look like `<org><team>-<n>`, e.g. `ab-1` is in team `ab` of
/// organization `a`.
fn hierarchy() -> EntityTypeRegistry {
    EntityTypeRegistry::new()
        .with_type(EntityTypeDefinition::new("organization"))
        .and_then(|r| {
            r.with_type(EntityTypeDefinition::new("team").inherit_with(|team_id, _context| {
                InheritTarget::entity("organization", &team_id[..1])
            }))
        })
        .and_then(|r| {
            r.with_type(
                EntityTypeDefinition::new("user")
                    .inherit_with(|user_id, _context| {
                        let team = user_id.split('-').next().unwrap_or_default();
                        InheritTarget::entity("team", team)
                    })
                    .cannot_override(["security"]),
            )
        })
        .expect("registry")
}

async fn seeded() -> (InMemoryDocumentStore, EntityConfigurationManager) {
    let store = InMemoryDocumentStore::new();
    let manager = EntityConfigurationManager::new(Arc::new(store.clone()), Arc::new(hierarchy()));

    manager
        .set_default(config(json!({
            "theme": "light",
            "size": 10,
            "security": { "mfa": false },
            "layout": { "columns": 1, "sidebar": true }
        })))
        .await
        .expect("default");
    manager
        .set_for_entity(
            &EntityRef::new("organization", "a"),
            config(json!({ "security": { "mfa": true }, "layout": { "columns": 2 } })),
            false,
        )
        .await
        .expect("organization");
    manager
        .set_for_entity(
            &EntityRef::new("team", "ab"),
            config(json!({ "theme": "dark", "layout": { "columns": 3 } })),
            false,
        )
        .await
        .expect("team");
    manager
        .set_for_entity(
            &EntityRef::new("user", "ab-1"),
            config(json!({ "size": 20 })),
            false,
        )
        .await
        .expect("user");

    store.reset_read_stats();
    (store, manager)
}

#[tokio::test]
async fn test_merge_precedence_across_three_levels() {
    let (_store, manager) = seeded().await;

    let resolved = manager
        .get_for_entity(&EntityRef::new("user", "ab-1"), &ResolveOptions::new())
        .await
        .expect("resolve");

    assert_eq!(
        Value::Object(resolved),
        json!({
            "theme": "dark",
            "size": 20,
            "security": { "mfa": true },
            "layout": { "columns": 3, "sidebar": true }
        })
    );
}

#[tokio::test]
async fn test_own_key_invariant_without_own_document() {
    let (_store, manager) = seeded().await;

    let document = manager
        .get_document_for_entity(&EntityRef::new("user", "ab-42"), &ResolveOptions::new())
        .await
        .expect("resolve")
        .expect("document");

    assert_eq!(document.key.as_str(), "user_ab-42");
    assert_eq!(document.config.get("theme"), Some(&json!("dark")));
}

#[tokio::test]
async fn test_bulk_equals_single_for_shared_ancestors() {
    let (store, manager) = seeded().await;
    let entities = vec![
        EntityRef::new("user", "ab-1"),
        EntityRef::new("user", "ab-2"),
        EntityRef::new("user", "ac-1"),
        EntityRef::new("team", "ab"),
        EntityRef::new("organization", "a"),
        EntityRef::new("organization", "z"),
        EntityRef::new("user", "ab-1"),
    ];

    let bulk = manager
        .get_for_entities(&entities, &ResolveOptions::new())
        .await
        .expect("bulk");
    assert_eq!(store.read_stats().total(), 1);

    for (index, entity) in entities.iter().enumerate() {
        let single = manager
            .get_for_entity(entity, &ResolveOptions::new())
            .await
            .expect("single");
        assert_eq!(bulk[index], single, "index {} ({})", index, entity);
    }
}

#[tokio::test]
async fn test_bulk_missing_everything_yields_empty_objects() {
    let store = InMemoryDocumentStore::new();
    let manager = EntityConfigurationManager::new(Arc::new(store), Arc::new(hierarchy()));

    let resolved = manager
        .get_for_entities(
            &[EntityRef::new("user", "xy-1"), EntityRef::new("team", "xy")],
            &ResolveOptions::new(),
        )
        .await
        .expect("bulk");

    assert_eq!(resolved, vec![ConfigMap::new(), ConfigMap::new()]);
}

#[tokio::test]
async fn test_null_write_reverts_to_ancestor_value() {
    let (_store, manager) = seeded().await;
    let user = EntityRef::new("user", "ab-1");
    let modifiers = Arc::new(Mutex::new(Vec::new()));

    let sink = modifiers.clone();
    manager
        .notifier()
        .subscribe(move |event: &AfterUpdateEvent| {
            sink.lock().expect("lock").push(event.modifier.clone());
        });

    manager
        .set_for_entity(&user, config(json!({ "theme": "red" })), false)
        .await
        .expect("override");
    manager
        .set_for_entity(&user, config(json!({ "theme": null })), false)
        .await
        .expect("revert");

    let resolved = manager
        .get_for_entity(&user, &ResolveOptions::new())
        .await
        .expect("resolve");
    assert_eq!(resolved.get("theme"), Some(&json!("dark")));

    let modifiers = modifiers.lock().expect("lock");
    assert_eq!(
        serde_json::to_value(&modifiers[1]).expect("serialize"),
        json!({
            "$set": { "entityType": "user", "entityId": "ab-1" },
            "$unset": ["config.theme"]
        })
    );
}

#[tokio::test]
async fn test_overwrite_versus_partial_write() {
    let (_store, manager) = seeded().await;
    let partial = EntityRef::new("user", "ab-2");
    let replaced = EntityRef::new("user", "ab-3");

    for entity in [&partial, &replaced] {
        manager
            .set_for_entity(entity, config(json!({ "a": 1, "b": 2 })), false)
            .await
            .expect("seed");
    }
    manager
        .set_for_entity(&partial, config(json!({ "a": 1 })), false)
        .await
        .expect("partial");
    manager
        .set_for_entity(&replaced, config(json!({ "a": 1 })), true)
        .await
        .expect("overwrite");

    let own = ResolveOptions::without_inheritance();
    assert_eq!(
        Value::Object(manager.get_for_entity(&partial, &own).await.expect("read")),
        json!({ "a": 1, "b": 2 })
    );
    assert_eq!(
        Value::Object(manager.get_for_entity(&replaced, &own).await.expect("read")),
        json!({ "a": 1 })
    );
}

#[tokio::test]
async fn test_inherit_false_never_shows_inherited_fields() {
    let (_store, manager) = seeded().await;

    let own = manager
        .get_for_entity(
            &EntityRef::new("user", "ab-1"),
            &ResolveOptions::without_inheritance(),
        )
        .await
        .expect("read");
    assert_eq!(Value::Object(own), json!({ "size": 20 }));

    let absent = manager
        .get_for_entity(
            &EntityRef::new("user", "ab-9"),
            &ResolveOptions::without_inheritance(),
        )
        .await
        .expect("read");
    assert!(absent.is_empty());
}

#[tokio::test]
async fn test_forbidden_field_only_settable_on_default() {
    let (_store, manager) = seeded().await;

    let rejected = manager
        .set_for_entity(
            &EntityRef::new("user", "ab-1"),
            config(json!({ "security": { "mfa": false } })),
            false,
        )
        .await;
    assert!(matches!(
        rejected,
        Err(ConfigurationError::ValidationFailed { .. })
    ));

    // Not forbidden for teams.
    manager
        .set_for_entity(
            &EntityRef::new("team", "ab"),
            config(json!({ "security": { "mfa": false } })),
            false,
        )
        .await
        .expect("team may set security");

    manager
        .set_default_for_prefix("security", json!({ "mfa": true, "sso": true }))
        .await
        .expect("default may set security");
    assert!(manager
        .has_default_for_prefix("security")
        .await
        .expect("prefix"));
}

#[tokio::test]
async fn test_every_write_emits_exactly_one_event() {
    let (_store, manager) = seeded().await;
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = events.clone();
    manager
        .notifier()
        .subscribe(move |event: &AfterUpdateEvent| {
            sink.lock().expect("lock").push(event.clone());
        });

    manager
        .set_default(config(json!({ "theme": "light" })))
        .await
        .expect("default");
    manager
        .set_default_for_prefix("layout", json!({ "columns": 4 }))
        .await
        .expect("prefix");
    manager
        .set_for_entity(
            &EntityRef::new("user", "ab-1"),
            config(json!({ "layout": { "columns": 5 } })),
            false,
        )
        .await
        .expect("entity");
    let _ = manager
        .set_for_entity(
            &EntityRef::new("user", "ab-1"),
            config(json!({ "security": { "mfa": false } })),
            false,
        )
        .await;

    let events = events.lock().expect("lock");
    assert_eq!(events.len(), 3);
    assert_eq!(
        serde_json::to_value(&events[2].modifier).expect("serialize"),
        json!({
            "$set": {
                "config.layout.columns": 5,
                "entityType": "user",
                "entityId": "ab-1"
            }
        })
    );
}

#[tokio::test]
async fn test_concurrent_reads_share_one_store() {
    let (_store, manager) = seeded().await;
    let manager = Arc::new(manager);

    let reads = (0..16).map(|n| {
        let manager = manager.clone();
        async move {
            let entity = EntityRef::new("user", format!("ab-{}", n % 4));
            manager
                .get_for_entity(&entity, &ResolveOptions::new())
                .await
        }
    });

    let results = join_all(reads).await;
    for result in results {
        let resolved = result.expect("resolve");
        assert_eq!(resolved.get("theme"), Some(&json!("dark")));
    }
}

#[tokio::test]
async fn test_settings_file_drives_depth_limit() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    std::io::Write::write_all(&mut file, b"max_inheritance_depth = 1\n").expect("write");
    let settings = EngineSettings::load(file.path()).expect("load");

    let store = InMemoryDocumentStore::new();
    let manager = EntityConfigurationManager::new(Arc::new(store), Arc::new(hierarchy()))
        .with_settings(settings);

    assert!(manager
        .get_for_entity(&EntityRef::new("team", "ab"), &ResolveOptions::new())
        .await
        .is_ok());
    assert!(matches!(
        manager
            .get_for_entity(&EntityRef::new("user", "ab-1"), &ResolveOptions::new())
            .await,
        Err(ConfigurationError::InheritanceTooDeep { max_depth: 1, .. })
    ));
}

/// Store whose every call fails, counting the attempts.
#[derive(Default)]
struct UnavailableStore {
    calls: AtomicUsize,
}

impl UnavailableStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> ConfigurationResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(store_down())
    }
}

fn store_down() -> ConfigurationError {
    ConfigurationError::StoreFailure {
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn find_one(&self, _key: &DocumentKey) -> ConfigurationResult<Option<ConfigDocument>> {
        self.fail()
    }

    async fn find_many(&self, _keys: &[DocumentKey]) -> ConfigurationResult<Vec<ConfigDocument>> {
        self.fail()
    }

    async fn find_by_filter(
        &self,
        _filter: &PublicationFilter,
    ) -> ConfigurationResult<Vec<ConfigDocument>> {
        self.fail()
    }

    async fn upsert(
        &self,
        _key: &DocumentKey,
        _operation: &UpdateOperation,
    ) -> ConfigurationResult<WriteResult> {
        self.fail()
    }

    async fn insert(&self, _document: ConfigDocument) -> ConfigurationResult<WriteResult> {
        self.fail()
    }

    async fn update(
        &self,
        _key: &DocumentKey,
        _operation: &UpdateOperation,
    ) -> ConfigurationResult<WriteResult> {
        self.fail()
    }
}

#[tokio::test]
async fn test_store_failure_reaches_readers_unchanged_without_retry() {
    let store = Arc::new(UnavailableStore::default());
    let manager = EntityConfigurationManager::new(store.clone(), Arc::new(hierarchy()));
    let user = EntityRef::new("user", "ab-1");

    let single = manager.get_for_entity(&user, &ResolveOptions::new()).await;
    assert_eq!(single, Err(store_down()));
    assert_eq!(store.calls(), 1);

    let own = manager
        .get_for_entity(&user, &ResolveOptions::without_inheritance())
        .await;
    assert_eq!(own, Err(store_down()));
    assert_eq!(store.calls(), 2);

    let bulk = manager
        .get_for_entities(
            &[user.clone(), EntityRef::new("team", "ab")],
            &ResolveOptions::new(),
        )
        .await;
    assert_eq!(bulk, Err(store_down()));
    assert_eq!(store.calls(), 3);

    assert_eq!(manager.get_default().await, Err(store_down()));
    assert_eq!(store.calls(), 4);
}

#[tokio::test]
async fn test_failed_write_emits_no_event() {
    let store = Arc::new(UnavailableStore::default());
    let manager = EntityConfigurationManager::new(store.clone(), Arc::new(hierarchy()));
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = events.clone();
    manager
        .notifier()
        .subscribe(move |event: &AfterUpdateEvent| {
            sink.lock().expect("lock").push(event.clone());
        });

    let entity = manager
        .set_for_entity(
            &EntityRef::new("user", "ab-1"),
            config(json!({ "size": 30 })),
            false,
        )
        .await;
    assert_eq!(entity, Err(store_down()));

    let default = manager.set_default(config(json!({ "theme": "light" }))).await;
    assert_eq!(default, Err(store_down()));

    let prefix = manager
        .set_default_for_prefix("layout", json!({ "columns": 2 }))
        .await;
    assert_eq!(prefix, Err(store_down()));

    assert_eq!(store.calls(), 3);
    assert!(events.lock().expect("lock").is_empty());
    assert_eq!(manager.notifier().listener_count(), 1);
}
