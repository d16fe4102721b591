//! Persisted configuration documents.
//!
//! A [`ConfigDocument`] is the unit the document store owns. Its `config`
//! payload is an arbitrarily nested JSON object in which every field is
//! optional: an absent field means "inherit".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::key::{DocumentKey, EntityRef, DEFAULT_KEY};

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;

/// A nested configuration payload.
pub type ConfigMap = Map<String, Value>;

/// Configuration document as persisted by the document store.
///
/// # Examples
///
/// ```rust
/// use entity_config::{ConfigDocument, EntityRef};
/// use serde_json::json;
///
/// let config = json!({ "theme": "dark" }).as_object().cloned().unwrap_or_default();
/// let doc = ConfigDocument::for_entity(&EntityRef::new("user", "42"), config);
///
/// assert_eq!(doc.key.as_str(), "user_42");
/// assert_eq!(doc.entity_type, "user");
/// assert_eq!(doc.entity_id, "42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Deterministic key, `{entity_type}_{entity_id}` or the default sentinel.
    #[serde(rename = "_id")]
    pub key: DocumentKey,

    /// Denormalized entity type (the sentinel for the default document).
    #[serde(rename = "entityType", default)]
    pub entity_type: String,

    /// Denormalized entity id (the sentinel for the default document).
    #[serde(rename = "entityId", default)]
    pub entity_id: String,

    /// The stored configuration.
    #[serde(default)]
    pub config: ConfigMap,
}

impl ConfigDocument {
    /// Creates an entity's own document.
    pub fn for_entity(entity: &EntityRef, config: ConfigMap) -> Self {
        Self {
            key: entity.key(),
            entity_type: entity.entity_type().to_string(),
            entity_id: entity.entity_id().to_string(),
            config,
        }
    }

    /// Creates the global default document.
    pub fn default_document(config: ConfigMap) -> Self {
        Self {
            key: DocumentKey::default_document(),
            entity_type: DEFAULT_KEY.to_string(),
            entity_id: DEFAULT_KEY.to_string(),
            config,
        }
    }

    /// Creates an empty document whose denormalized fields are derived from the key.
    ///
    /// Used by stores when an upsert has to create a document first.
    pub fn empty(key: DocumentKey) -> Self {
        if key.is_default() {
            return Self::default_document(ConfigMap::new());
        }

        let entity_type = key.entity_type().unwrap_or_default().to_string();
        let entity_id = key.entity_id().unwrap_or_default().to_string();
        Self {
            key,
            entity_type,
            entity_id,
            config: ConfigMap::new(),
        }
    }

    /// Converts the document into its stored JSON form.
    pub fn to_value(&self) -> ConfigurationResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigurationError::StoreFailure {
            reason: format!("Failed to serialize document {}: {}", self.key, e),
        })
    }

    /// Reads a document back from its stored JSON form.
    pub fn from_value(value: Value) -> ConfigurationResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigurationError::StoreFailure {
            reason: format!("Stored document is malformed: {}", e),
        })
    }
}
