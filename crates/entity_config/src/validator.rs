//! Write validation types and the forbidden-field guard.
//!
//! A write to an entity's own document may never set a field its type lists
//! as forbidden: such fields must always come from an ancestor or the default
//! document. [`ForbiddenFieldGuard`] enforces that before the write reaches the
//! store. Writes to the default document are never checked.
//!
//! # Examples
//!
//! ```rust
//! use entity_config::{
//!     DocumentKey, EntityTypeDefinition, EntityTypeRegistry, ForbiddenFieldGuard,
//!     UpdateOperation,
//! };
//! use serde_json::json;
//!
//! let registry = EntityTypeRegistry::new()
//!     .with_type(EntityTypeDefinition::new("user").cannot_override(["quota"]))?;
//! let guard = ForbiddenFieldGuard::new();
//!
//! let write = UpdateOperation::new().with_set("config.quota", json!(5));
//! assert!(guard.check(&registry, &DocumentKey::for_entity("user", "1"), &write).is_err());
//! assert!(guard.check(&registry, &DocumentKey::default_document(), &write).is_ok());
//! # Ok::<(), entity_config::ConfigurationError>(())
//! ```

use serde_json::Value;
use std::fmt;
use tracing::warn;

use crate::document::ConfigMap;
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::key::DocumentKey;
use crate::operation::UpdateOperation;
use crate::registry::{EntityTypeDefinition, EntityTypeRegistry};

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

/// Individual validation error with context.
///
/// # Examples
///
/// ```rust
/// use entity_config::{ValidationError, ValidationErrorType};
///
/// let error = ValidationError {
///     error_type: ValidationErrorType::ForbiddenField,
///     field_path: "billing.plan".to_string(),
///     message: "Field 'billing.plan' cannot be overridden by entity type 'user'".to_string(),
///     suggestion: None,
/// };
/// assert_eq!(error.error_type.to_string(), "forbidden field");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The category of validation error.
    pub error_type: ValidationErrorType,
    /// Dot-separated path to the offending field, relative to `config`.
    pub field_path: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    pub suggestion: Option<String>,
}

/// Validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorType {
    /// The write sets a field the entity type may not override.
    ForbiddenField,
    /// The written configuration does not match the configuration schema.
    SchemaViolation,
}

impl fmt::Display for ValidationErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForbiddenField => f.write_str("forbidden field"),
            Self::SchemaViolation => f.write_str("schema violation"),
        }
    }
}

/// Pre-write guard rejecting forbidden fields on entity documents.
///
/// The entity type is recovered from the document key, so the guard works on
/// the exact operation that is about to be sent to the store.
#[derive(Debug, Clone, Default)]
pub struct ForbiddenFieldGuard {}

impl ForbiddenFieldGuard {
    pub fn new() -> Self {
        Self {}
    }

    /// Checks the `config` fields set by `operation` against the forbidden
    /// fields of the entity type owning `key`.
    ///
    /// Unsetting a forbidden field is allowed; it only resumes inheritance.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::ValidationFailed` listing every offending
    /// path. Nested paths under an already reported field are not repeated.
    pub fn check(
        &self,
        registry: &EntityTypeRegistry,
        key: &DocumentKey,
        operation: &UpdateOperation,
    ) -> ConfigurationResult<()> {
        if key.is_default() {
            return Ok(());
        }
        let Some(entity_type) = key.entity_type() else {
            return Ok(());
        };
        let Some(definition) = registry.get(entity_type) else {
            return Ok(());
        };
        if definition.forbidden_fields().is_empty() {
            return Ok(());
        }

        let mut errors = Vec::new();
        collect_forbidden(definition, &operation.config_projection(), "", &mut errors);

        if errors.is_empty() {
            return Ok(());
        }

        warn!(
            key = %key,
            error_count = errors.len(),
            "Write rejected: forbidden fields"
        );
        Err(ConfigurationError::ValidationFailed {
            entity_type: entity_type.to_string(),
            error_count: errors.len(),
            errors,
        })
    }
}

fn collect_forbidden(
    definition: &EntityTypeDefinition,
    fields: &ConfigMap,
    prefix: &str,
    errors: &mut Vec<ValidationError>,
) {
    for (name, value) in fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        if definition.is_forbidden(&path) {
            errors.push(ValidationError {
                error_type: ValidationErrorType::ForbiddenField,
                message: format!(
                    "Field '{}' cannot be overridden by entity type '{}'",
                    path,
                    definition.name()
                ),
                suggestion: Some(
                    "Set this field on an ancestor or on the default document".to_string(),
                ),
                field_path: path,
            });
            continue;
        }

        if let Value::Object(children) = value {
            collect_forbidden(definition, children, &path, errors);
        }
    }
}
