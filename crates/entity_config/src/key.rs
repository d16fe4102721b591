//! Entity references and persisted document keys.
//!
//! Every configuration document is stored under a deterministic key:
//! `{entity_type}_{entity_id}` for entity documents, and the fixed
//! [`DEFAULT_KEY`] sentinel for the global default document.
//!
//! Entity ids never contain the [`KEY_SEPARATOR`]. This keeps the inverse
//! operation (recovering the entity type from a key) unambiguous even when
//! the entity type itself contains the separator.
//!
//! # Examples
//!
//! ```rust
//! use entity_config::{DocumentKey, EntityRef};
//!
//! let entity = EntityRef::new("user", "42");
//! let key = entity.key();
//! assert_eq!(key.as_str(), "user_42");
//! assert_eq!(key.entity_type(), Some("user"));
//!
//! assert!(DocumentKey::default_document().is_default());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ConfigurationError, ConfigurationResult};

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;

/// Key, entity type and entity id of the global default document.
pub const DEFAULT_KEY: &str = "_default";

/// Separator between the entity type and the entity id in a document key.
pub const KEY_SEPARATOR: char = '_';

/// A `(type, id)` pair identifying something that owns configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    entity_type: String,
    entity_id: String,
}

impl EntityRef {
    /// Creates a new entity reference.
    ///
    /// No validation happens here; see [`EntityRef::validate`].
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }

    /// The entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The entity id.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// The key of this entity's own configuration document.
    pub fn key(&self) -> DocumentKey {
        DocumentKey::for_entity(&self.entity_type, &self.entity_id)
    }

    /// Checks that this reference produces an unambiguous document key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidEntityReference` when the type or
    /// id is empty, or when the id contains the key separator.
    pub fn validate(&self) -> ConfigurationResult<()> {
        let reason = if self.entity_type.is_empty() {
            Some("entity type must not be empty".to_string())
        } else if self.entity_id.is_empty() {
            Some("entity id must not be empty".to_string())
        } else if self.entity_id.contains(KEY_SEPARATOR) {
            Some(format!(
                "entity id must not contain the key separator '{}'",
                KEY_SEPARATOR
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ConfigurationError::InvalidEntityReference {
                entity_type: self.entity_type.clone(),
                entity_id: self.entity_id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Persisted key of a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Key of the global default document.
    pub fn default_document() -> Self {
        Self(DEFAULT_KEY.to_string())
    }

    /// Key of an entity's own document.
    pub fn for_entity(entity_type: &str, entity_id: &str) -> Self {
        Self(format!("{}{}{}", entity_type, KEY_SEPARATOR, entity_id))
    }

    /// Wraps an already-formatted key, e.g. one read back from storage.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Whether this is the global default document key.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_KEY
    }

    /// The key as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recovers the entity type from the key.
    ///
    /// Returns `None` for the default key and for keys without a separator.
    /// Splits on the last separator since ids never contain one.
    pub fn entity_type(&self) -> Option<&str> {
        self.split().map(|(entity_type, _)| entity_type)
    }

    /// Recovers the entity id from the key.
    pub fn entity_id(&self) -> Option<&str> {
        self.split().map(|(_, entity_id)| entity_id)
    }

    fn split(&self) -> Option<(&str, &str)> {
        if self.is_default() {
            return None;
        }
        self.0
            .rsplit_once(KEY_SEPARATOR)
            .filter(|(entity_type, entity_id)| !entity_type.is_empty() && !entity_id.is_empty())
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&EntityRef> for DocumentKey {
    fn from(entity: &EntityRef) -> Self {
        entity.key()
    }
}
