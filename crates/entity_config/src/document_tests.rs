//! Tests for configuration documents.

use super::*;
use serde_json::json;

fn config(value: Value) -> ConfigMap {
    value.as_object().cloned().expect("config must be an object")
}

#[test]
fn test_default_document_uses_sentinel_everywhere() {
    let doc = ConfigDocument::default_document(ConfigMap::new());
    assert_eq!(doc.key.as_str(), DEFAULT_KEY);
    assert_eq!(doc.entity_type, DEFAULT_KEY);
    assert_eq!(doc.entity_id, DEFAULT_KEY);
}

#[test]
fn test_empty_document_derives_fields_from_key() {
    let doc = ConfigDocument::empty(DocumentKey::for_entity("organization", "acme"));
    assert_eq!(doc.entity_type, "organization");
    assert_eq!(doc.entity_id, "acme");
    assert!(doc.config.is_empty());

    let default_doc = ConfigDocument::empty(DocumentKey::default_document());
    assert_eq!(default_doc.entity_type, DEFAULT_KEY);
}

#[test]
fn test_document_serializes_with_stored_field_names() {
    let doc = ConfigDocument::for_entity(
        &EntityRef::new("user", "42"),
        config(json!({ "theme": "dark" })),
    );

    let value = doc.to_value().expect("Failed to serialize");
    assert_eq!(
        value,
        json!({
            "_id": "user_42",
            "entityType": "user",
            "entityId": "42",
            "config": { "theme": "dark" }
        })
    );
}

#[test]
fn test_document_without_config_reads_back_empty() {
    let doc = ConfigDocument::from_value(json!({ "_id": "_default" })).expect("Failed to parse");
    assert!(doc.key.is_default());
    assert!(doc.config.is_empty());
    assert_eq!(doc.entity_type, "");
}

#[test]
fn test_malformed_document_is_store_failure() {
    let result = ConfigDocument::from_value(json!({ "config": {} }));
    assert!(matches!(
        result,
        Err(ConfigurationError::StoreFailure { .. })
    ));
}
