//! Storage update operations.
//!
//! An [`UpdateOperation`] is the `{ $set, $unset }` modifier sent to the
//! document store. `$set` assigns dot-paths, `$unset` removes them, and the
//! store applies both atomically.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::document::ConfigMap;

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;

/// Prefix under which configuration fields live in a stored document.
pub const CONFIG_FIELD: &str = "config";

/// A set/unset modifier applied to one document.
///
/// # Examples
///
/// ```rust
/// use entity_config::UpdateOperation;
/// use serde_json::json;
///
/// let operation = UpdateOperation::new()
///     .with_set("config.theme", json!("dark"))
///     .with_unset("config.size");
///
/// let mut document = json!({ "_id": "user_1", "config": { "size": 10 } });
/// operation.apply_to(&mut document);
///
/// assert_eq!(document, json!({ "_id": "user_1", "config": { "theme": "dark" } }));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateOperation {
    /// Dot-paths to assign.
    #[serde(rename = "$set", default, skip_serializing_if = "Map::is_empty")]
    pub set: Map<String, Value>,

    /// Dot-paths to remove.
    #[serde(rename = "$unset", default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unset: BTreeSet<String>,
}

impl UpdateOperation {
    /// Creates an empty operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `$set` entry.
    pub fn with_set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.set.insert(path.into(), value);
        self
    }

    /// Adds an `$unset` entry.
    pub fn with_unset(mut self, path: impl Into<String>) -> Self {
        self.unset.insert(path.into());
        self
    }

    /// Whether the operation changes nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Applies the operation to a stored document in place.
    ///
    /// Intermediate objects are created as needed. A non-object value standing
    /// in the way of a nested `$set` is replaced by an object.
    pub fn apply_to(&self, document: &mut Value) {
        for (path, value) in &self.set {
            set_path(document, path, value.clone());
        }
        for path in &self.unset {
            unset_path(document, path);
        }
    }

    /// Rebuilds the nested configuration this operation writes.
    ///
    /// Only `$set` entries under `config` contribute. Used to validate a write
    /// against forbidden fields and the configuration schema.
    pub fn config_projection(&self) -> ConfigMap {
        let mut projection = Value::Object(Map::new());
        for (path, value) in &self.set {
            if path == CONFIG_FIELD {
                if let Value::Object(fields) = value {
                    for (key, field_value) in fields {
                        set_path(&mut projection, key, field_value.clone());
                    }
                }
            } else if let Some(config_path) = path
                .strip_prefix(CONFIG_FIELD)
                .and_then(|rest| rest.strip_prefix('.'))
            {
                set_path(&mut projection, config_path, value.clone());
            }
        }

        match projection {
            Value::Object(map) => map,
            _ => ConfigMap::new(),
        }
    }
}

/// Assigns `value` at the dot-separated `path`.
pub(crate) fn set_path(target: &mut Value, path: &str, value: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(child, rest, value);
        }
    }
}

/// Removes the field at the dot-separated `path`, if present.
pub(crate) fn unset_path(target: &mut Value, path: &str) {
    let Value::Object(map) = target else {
        return;
    };

    match path.split_once('.') {
        None => {
            map.remove(path);
        }
        Some((head, rest)) => {
            if let Some(child) = map.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}
