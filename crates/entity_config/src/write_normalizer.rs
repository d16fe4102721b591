//! Write normalization.
//!
//! Turns a caller's partial configuration update into the exact
//! [`UpdateOperation`] sent to the store.
//!
//! A partial update is flattened into dot-path leaves under `config`. Arrays
//! and empty objects are leaves; they are never expanded element by element.
//! A leaf that carries no value (`null`, an empty string unless that rule is
//! switched off, or an array that cleans down to nothing) becomes an `$unset`
//! so the field falls back to its inherited value instead of being stored as
//! null.
//!
//! # Examples
//!
//! ```rust
//! use entity_config::{EntityRef, WriteNormalizer};
//! use serde_json::json;
//!
//! let normalizer = WriteNormalizer::new(true);
//! let props = json!({ "color": null, "layout": { "columns": 2 } });
//!
//! let operation = normalizer.entity_operation(
//!     &EntityRef::new("user", "42"),
//!     props.as_object().cloned().unwrap_or_default(),
//!     false,
//! );
//!
//! assert_eq!(operation.set.get("config.layout.columns"), Some(&json!(2)));
//! assert!(operation.unset.contains("config.color"));
//! ```

use serde_json::{Map, Value};

use crate::document::ConfigMap;
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::key::EntityRef;
use crate::operation::{UpdateOperation, CONFIG_FIELD};

#[cfg(test)]
#[path = "write_normalizer_tests.rs"]
mod tests;

/// Persisted field holding the document's entity type.
pub const ENTITY_TYPE_FIELD: &str = "entityType";

/// Persisted field holding the document's entity id.
pub const ENTITY_ID_FIELD: &str = "entityId";

/// Builds storage operations from caller-supplied configuration.
#[derive(Debug, Clone)]
pub struct WriteNormalizer {
    remove_empty_strings: bool,
}

impl Default for WriteNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl WriteNormalizer {
    /// Creates a normalizer. With `remove_empty_strings` set, an empty string
    /// leaf is treated like `null`.
    pub fn new(remove_empty_strings: bool) -> Self {
        Self {
            remove_empty_strings,
        }
    }

    /// Flattens `props` into `(dot.path, leaf)` pairs.
    ///
    /// Nested objects are walked; arrays, scalars and empty objects are
    /// leaves.
    pub fn flatten(&self, props: &ConfigMap) -> Vec<(String, Value)> {
        let mut leaves = Vec::new();
        flatten_into(props, "", &mut leaves);
        leaves
    }

    /// Builds the write for an entity's own document.
    ///
    /// With `overwrite` the whole `config` field is replaced by `props`
    /// verbatim. Otherwise each flattened leaf is set or unset individually.
    /// `entityType` and `entityId` are always part of the `$set`.
    pub fn entity_operation(
        &self,
        entity: &EntityRef,
        props: ConfigMap,
        overwrite: bool,
    ) -> UpdateOperation {
        let mut operation = if overwrite {
            UpdateOperation::new().with_set(CONFIG_FIELD, Value::Object(props))
        } else {
            self.partial_operation(&props)
        };

        operation.set.insert(
            ENTITY_TYPE_FIELD.to_string(),
            Value::String(entity.entity_type().to_string()),
        );
        operation.set.insert(
            ENTITY_ID_FIELD.to_string(),
            Value::String(entity.entity_id().to_string()),
        );
        operation
    }

    /// Builds the write replacing the default document's whole `config`.
    pub fn default_operation(&self, config: ConfigMap) -> UpdateOperation {
        UpdateOperation::new().with_set(CONFIG_FIELD, Value::Object(config))
    }

    /// Builds the write replacing the single default field `config.<prefix>`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidPrefix` when `prefix` fails
    /// [`validate_prefix`].
    pub fn prefix_operation(
        &self,
        prefix: &str,
        data: Value,
    ) -> ConfigurationResult<UpdateOperation> {
        validate_prefix(prefix)?;
        Ok(UpdateOperation::new().with_set(format!("{}.{}", CONFIG_FIELD, prefix), data))
    }

    fn partial_operation(&self, props: &ConfigMap) -> UpdateOperation {
        let mut operation = UpdateOperation::new();
        for (path, leaf) in self.flatten(props) {
            let path = format!("{}.{}", CONFIG_FIELD, path);
            match self.settle_leaf(leaf) {
                Some(value) => {
                    operation.set.insert(path, value);
                }
                None => {
                    operation.unset.insert(path);
                }
            }
        }
        operation
    }

    /// Returns the value to store for a leaf, or `None` if it should be unset.
    fn settle_leaf(&self, leaf: Value) -> Option<Value> {
        match leaf {
            Value::Null => None,
            Value::String(s) if s.is_empty() && self.remove_empty_strings => None,
            Value::Array(items) => {
                let cleaned = self.clean_array(items);
                (!cleaned.is_empty()).then_some(Value::Array(cleaned))
            }
            other => Some(other),
        }
    }

    fn clean_array(&self, items: Vec<Value>) -> Vec<Value> {
        items
            .into_iter()
            .filter_map(|item| self.clean_value(item))
            .collect()
    }

    fn clean_value(&self, value: Value) -> Option<Value> {
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() && self.remove_empty_strings => None,
            Value::Array(items) => {
                let cleaned = self.clean_array(items);
                (!cleaned.is_empty()).then_some(Value::Array(cleaned))
            }
            Value::Object(fields) => {
                let cleaned: Map<String, Value> = fields
                    .into_iter()
                    .filter_map(|(name, field)| self.clean_value(field).map(|field| (name, field)))
                    .collect();
                (!cleaned.is_empty()).then_some(Value::Object(cleaned))
            }
            other => Some(other),
        }
    }
}

fn flatten_into(fields: &ConfigMap, prefix: &str, leaves: &mut Vec<(String, Value)>) {
    for (name, value) in fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        match value {
            Value::Object(children) if !children.is_empty() => {
                flatten_into(children, &path, leaves);
            }
            leaf => leaves.push((path, leaf.clone())),
        }
    }
}

/// Checks that `prefix` names a field: non-empty, with no empty dot segment.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidPrefix` otherwise.
pub fn validate_prefix(prefix: &str) -> ConfigurationResult<()> {
    let reason = if prefix.is_empty() {
        "prefix must not be empty"
    } else if prefix.split('.').any(str::is_empty) {
        "prefix must not contain an empty path segment"
    } else {
        return Ok(());
    };

    Err(ConfigurationError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: reason.to_string(),
    })
}
