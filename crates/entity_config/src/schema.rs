//! Configuration schema validation.
//!
//! Wraps a compiled JSON Schema describing the shape of the `config` payload.
//! Every configuration field is optional (absence means "inherit"), so all
//! `required` lists are stripped from the schema before it is compiled.
//! Validation runs against the configuration a write is about to set, not
//! against the merged view.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::document::ConfigMap;
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::validator::{ValidationError, ValidationErrorType};
use crate::write_normalizer::validate_prefix;

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

/// A compiled configuration schema.
///
/// # Examples
///
/// ```rust
/// use entity_config::ConfigurationSchema;
/// use serde_json::json;
///
/// let schema = ConfigurationSchema::new(json!({
///     "type": "object",
///     "properties": { "theme": { "type": "string" } },
///     "required": ["theme"]
/// }))?;
///
/// // `required` is ignored: an empty configuration is valid.
/// assert!(schema.validate(&serde_json::Map::new()).is_ok());
///
/// let bad = json!({ "theme": 3 });
/// assert!(schema.validate(bad.as_object().unwrap()).is_err());
/// # Ok::<(), entity_config::ConfigurationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigurationSchema {
    source: Value,
    validator: Arc<jsonschema::Validator>,
}

impl ConfigurationSchema {
    /// Compiles `schema` after removing every `required` list from it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::SchemaCompilation` if the result is not a
    /// valid JSON Schema.
    pub fn new(schema: Value) -> ConfigurationResult<Self> {
        let mut source = schema;
        strip_required(&mut source);

        let validator = jsonschema::options().build(&source).map_err(|e| {
            ConfigurationError::SchemaCompilation {
                reason: e.to_string(),
            }
        })?;

        debug!("Compiled configuration schema");
        Ok(Self {
            source,
            validator: Arc::new(validator),
        })
    }

    /// Returns a schema that additionally describes `config.<prefix>` with
    /// `schema`, replacing any earlier description of that field.
    ///
    /// # Errors
    ///
    /// `InvalidPrefix` for an empty prefix or one with an empty dot segment,
    /// and `SchemaCompilation` when the combined schema does not compile.
    pub fn with_prefix(&self, prefix: &str, schema: Value) -> ConfigurationResult<Self> {
        validate_prefix(prefix)?;

        let mut source = self.source.clone();
        if !source.is_object() {
            source = Value::Object(Map::new());
        }

        if let Value::Object(root) = &mut source {
            let properties = root
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
            if !properties.is_object() {
                *properties = Value::Object(Map::new());
            }
            if let Value::Object(properties) = properties {
                properties.insert(prefix.to_string(), schema);
            }
        }

        Self::new(source)
    }

    /// The schema as compiled, with `required` lists removed.
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Validates a configuration payload.
    ///
    /// Returns every violation found, each carrying the dot path of the
    /// offending field.
    pub fn validate(&self, config: &ConfigMap) -> Result<(), Vec<ValidationError>> {
        let instance = Value::Object(config.clone());
        let errors: Vec<ValidationError> = self
            .validator
            .iter_errors(&instance)
            .map(|error| {
                let field_path = pointer_to_path(&error.instance_path().to_string());
                ValidationError {
                    error_type: ValidationErrorType::SchemaViolation,
                    field_path,
                    message: error.to_string(),
                    suggestion: None,
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Removes every array-valued `required` keyword, at any depth.
///
/// A property that happens to be named `required` holds a schema object, not
/// an array, so it survives.
fn strip_required(schema: &mut Value) {
    match schema {
        Value::Object(fields) => {
            if fields.get("required").is_some_and(Value::is_array) {
                fields.remove("required");
            }
            for value in fields.values_mut() {
                strip_required(value);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_required(item);
            }
        }
        _ => {}
    }
}

/// Converts a JSON pointer (`/a/b`) into a dot path (`a.b`).
fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}
