//! Tests for the forbidden-field guard.

use super::*;
use serde_json::json;

fn registry() -> EntityTypeRegistry {
    EntityTypeRegistry::new()
        .with_type(EntityTypeDefinition::new("user").cannot_override(["billing.plan", "quota"]))
        .expect("registry")
}

fn user_key() -> DocumentKey {
    DocumentKey::for_entity("user", "1")
}

#[test]
fn test_allowed_fields_pass() {
    let operation = UpdateOperation::new()
        .with_set("config.theme", json!("dark"))
        .with_set("config.billing.address", json!("somewhere"));

    assert!(ForbiddenFieldGuard::new()
        .check(&registry(), &user_key(), &operation)
        .is_ok());
}

#[test]
fn test_exact_forbidden_path_is_rejected() {
    let operation = UpdateOperation::new().with_set("config.quota", json!(10));

    match ForbiddenFieldGuard::new().check(&registry(), &user_key(), &operation) {
        Err(ConfigurationError::ValidationFailed {
            entity_type,
            error_count,
            errors,
        }) => {
            assert_eq!(entity_type, "user");
            assert_eq!(error_count, 1);
            assert_eq!(errors[0].error_type, ValidationErrorType::ForbiddenField);
            assert_eq!(errors[0].field_path, "quota");
        }
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[test]
fn test_nested_path_under_forbidden_field_is_rejected() {
    let operation = UpdateOperation::new().with_set("config.billing.plan.tier", json!("gold"));

    let result = ForbiddenFieldGuard::new().check(&registry(), &user_key(), &operation);
    assert!(matches!(
        result,
        Err(ConfigurationError::ValidationFailed { .. })
    ));
}

#[test]
fn test_whole_config_replacement_is_checked() {
    let operation =
        UpdateOperation::new().with_set("config", json!({ "billing": { "plan": "pro" } }));

    match ForbiddenFieldGuard::new().check(&registry(), &user_key(), &operation) {
        Err(ConfigurationError::ValidationFailed { errors, .. }) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field_path, "billing.plan");
        }
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[test]
fn test_descendants_of_reported_field_are_not_repeated() {
    let registry = EntityTypeRegistry::new()
        .with_type(EntityTypeDefinition::new("user").cannot_override(["billing"]))
        .expect("registry");
    let operation = UpdateOperation::new()
        .with_set("config", json!({ "billing": { "plan": "pro", "seats": 3 } }));

    match ForbiddenFieldGuard::new().check(&registry, &user_key(), &operation) {
        Err(ConfigurationError::ValidationFailed { errors, .. }) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field_path, "billing");
        }
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }
}

#[test]
fn test_similar_prefix_is_not_forbidden() {
    let operation = UpdateOperation::new().with_set("config.quotas", json!(1));

    assert!(ForbiddenFieldGuard::new()
        .check(&registry(), &user_key(), &operation)
        .is_ok());
}

#[test]
fn test_unsetting_forbidden_field_is_allowed() {
    let operation = UpdateOperation::new().with_unset("config.quota");

    assert!(ForbiddenFieldGuard::new()
        .check(&registry(), &user_key(), &operation)
        .is_ok());
}

#[test]
fn test_default_document_is_never_checked() {
    let operation = UpdateOperation::new().with_set("config.quota", json!(10));

    assert!(ForbiddenFieldGuard::new()
        .check(&registry(), &DocumentKey::default_document(), &operation)
        .is_ok());
}

#[test]
fn test_unregistered_type_has_no_forbidden_fields() {
    let operation = UpdateOperation::new().with_set("config.quota", json!(10));

    assert!(ForbiddenFieldGuard::new()
        .check(&registry(), &DocumentKey::for_entity("team", "1"), &operation)
        .is_ok());
}

#[test]
fn test_type_is_recovered_from_keys_with_separator_in_type() {
    let registry = EntityTypeRegistry::new()
        .with_type(EntityTypeDefinition::new("billing_account").cannot_override(["owner"]))
        .expect("registry");
    let operation = UpdateOperation::new().with_set("config.owner", json!("x"));

    let result = ForbiddenFieldGuard::new().check(
        &registry,
        &DocumentKey::for_entity("billing_account", "7"),
        &operation,
    );
    assert!(result.is_err());
}

#[test]
fn test_error_type_display() {
    assert_eq!(ValidationErrorType::SchemaViolation.to_string(), "schema violation");
    assert_eq!(ValidationErrorType::ForbiddenField.to_string(), "forbidden field");
}
