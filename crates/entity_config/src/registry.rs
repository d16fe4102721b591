//! Entity type registry.
//!
//! Each entity type that owns configuration is described by an
//! [`EntityTypeDefinition`]: how it inherits, which fields it may never set,
//! who may write it, and which instances a caller may observe. Definitions are
//! collected in an [`EntityTypeRegistry`] during startup and then shared,
//! read-only, with the resolver and the write path.
//!
//! # Examples
//!
//! ```rust
//! use entity_config::{EntityTypeDefinition, EntityTypeRegistry, InheritTarget};
//!
//! let mut registry = EntityTypeRegistry::new();
//! registry.register(EntityTypeDefinition::new("organization"))?;
//! registry.register(
//!     EntityTypeDefinition::new("user")
//!         .inherit_with(|_user_id, _context| InheritTarget::entity("organization", "acme"))
//!         .cannot_override(["billing.plan"]),
//! )?;
//!
//! assert!(registry.contains("user"));
//! assert!(registry.require("user")?.is_forbidden("billing.plan.tier"));
//! # Ok::<(), entity_config::ConfigurationError>(())
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::key::EntityRef;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

/// Caller-supplied context handed to inherit functions.
///
/// This is every resolution option except the `inherit` flag itself.
pub type InheritContext = Map<String, Value>;

/// Inherit relation: given an entity id and the caller's context, names the next ancestor.
///
/// An error is surfaced by the chain resolver unchanged, except that a
/// `MalformedInheritResult` without an entity is attributed to the entity
/// being walked.
pub type InheritFn =
    Arc<dyn Fn(&str, &InheritContext) -> ConfigurationResult<InheritTarget> + Send + Sync>;

/// Write authorization gate: `(acting user, entity id) -> allowed`.
pub type WritePredicate = Arc<dyn Fn(Option<&str>, &str) -> bool + Send + Sync>;

/// Publication selector: the instance ids a user may observe.
pub type PublishSelector = Arc<dyn Fn(Option<&str>) -> Vec<String> + Send + Sync>;

/// Where an entity inherits its configuration from next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InheritTarget {
    /// Stop walking and inherit from the global default document.
    Default,
    /// Inherit from another entity, then keep walking from there.
    Entity(EntityRef),
}

impl InheritTarget {
    /// Inherit from the given entity.
    pub fn entity(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::Entity(EntityRef::new(entity_type, entity_id))
    }
}

impl TryFrom<Vec<String>> for InheritTarget {
    type Error = ConfigurationError;

    /// Accepts exactly a `[type, id]` pair.
    ///
    /// The error names no entity; the registry fills it in when the pair
    /// came from an inherit function.
    fn try_from(parts: Vec<String>) -> Result<Self, Self::Error> {
        match <[String; 2]>::try_from(parts) {
            Ok([entity_type, entity_id]) => Ok(Self::entity(entity_type, entity_id)),
            Err(parts) => Err(ConfigurationError::MalformedInheritResult {
                entity_type: String::new(),
                entity_id: String::new(),
                reason: format!(
                    "expected a [type, id] pair but got {} element(s): {:?}",
                    parts.len(),
                    parts
                ),
            }),
        }
    }
}

/// Definition of one entity type.
#[derive(Clone)]
pub struct EntityTypeDefinition {
    name: String,
    inherit: Option<InheritFn>,
    forbidden_fields: Vec<String>,
    write: Option<WritePredicate>,
    publish: Option<PublishSelector>,
}

impl EntityTypeDefinition {
    /// Creates a definition that inherits from the default, forbids nothing,
    /// allows every write and publishes nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inherit: None,
            forbidden_fields: Vec::new(),
            write: None,
            publish: None,
        }
    }

    /// Sets an inherit relation that always yields a target.
    pub fn inherit_with<F>(self, inherit: F) -> Self
    where
        F: Fn(&str, &InheritContext) -> InheritTarget + Send + Sync + 'static,
    {
        self.try_inherit_with(move |entity_id, context| Ok(inherit(entity_id, context)))
    }

    /// Sets an inherit relation that may reject its own result.
    ///
    /// Use this when the target is built from dynamic data, e.g. through
    /// `InheritTarget::try_from(parts)`.
    pub fn try_inherit_with<F>(mut self, inherit: F) -> Self
    where
        F: Fn(&str, &InheritContext) -> ConfigurationResult<InheritTarget> + Send + Sync + 'static,
    {
        self.inherit = Some(Arc::new(inherit));
        self
    }

    /// Lists fields this type's own document may never set.
    ///
    /// A dot-path covers all of its descendants.
    pub fn cannot_override<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the write authorization gate.
    pub fn with_write_permission<F>(mut self, write: F) -> Self
    where
        F: Fn(Option<&str>, &str) -> bool + Send + Sync + 'static,
    {
        self.write = Some(Arc::new(write));
        self
    }

    /// Sets the publication selector.
    pub fn with_publish<F>(mut self, publish: F) -> Self
    where
        F: Fn(Option<&str>) -> Vec<String> + Send + Sync + 'static,
    {
        self.publish = Some(Arc::new(publish));
        self
    }

    /// The entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields this type may never set on its own document.
    pub fn forbidden_fields(&self) -> &[String] {
        &self.forbidden_fields
    }

    /// Whether `field_path` equals, or is nested under, a forbidden field.
    pub fn is_forbidden(&self, field_path: &str) -> bool {
        self.forbidden_fields.iter().any(|forbidden| {
            field_path == forbidden
                || field_path
                    .strip_prefix(forbidden.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Evaluates the inherit relation; no relation means "inherit from default".
    ///
    /// # Errors
    ///
    /// Whatever the inherit function returns. A `MalformedInheritResult`
    /// that names no entity is attributed to this type and `entity_id`.
    pub fn inherit_target(
        &self,
        entity_id: &str,
        context: &InheritContext,
    ) -> ConfigurationResult<InheritTarget> {
        let Some(inherit) = &self.inherit else {
            return Ok(InheritTarget::Default);
        };

        inherit(entity_id, context).map_err(|error| match error {
            ConfigurationError::MalformedInheritResult {
                entity_type,
                entity_id: failed_id,
                reason,
            } if entity_type.is_empty() && failed_id.is_empty() => {
                ConfigurationError::MalformedInheritResult {
                    entity_type: self.name.clone(),
                    entity_id: entity_id.to_string(),
                    reason,
                }
            }
            other => other,
        })
    }

    /// Evaluates the write gate; no gate means always allowed.
    pub fn can_write(&self, user_id: Option<&str>, entity_id: &str) -> bool {
        match &self.write {
            Some(write) => write(user_id, entity_id),
            None => true,
        }
    }

    /// Evaluates the publication selector; no selector publishes nothing.
    pub fn published_ids(&self, user_id: Option<&str>) -> Vec<String> {
        match &self.publish {
            Some(publish) => publish(user_id),
            None => Vec::new(),
        }
    }
}

impl fmt::Debug for EntityTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTypeDefinition")
            .field("name", &self.name)
            .field("inherit", &self.inherit.as_ref().map(|_| "Fn"))
            .field("forbidden_fields", &self.forbidden_fields)
            .field("write", &self.write.as_ref().map(|_| "Fn"))
            .field("publish", &self.publish.as_ref().map(|_| "Fn"))
            .finish()
    }
}

/// Table of registered entity types, keyed by name.
///
/// Built during startup and shared behind an `Arc` afterwards.
#[derive(Debug, Clone, Default)]
pub struct EntityTypeRegistry {
    types: BTreeMap<String, EntityTypeDefinition>,
}

impl EntityTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type, replacing any previous definition of the same name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidEntityType` for an empty name.
    pub fn register(&mut self, definition: EntityTypeDefinition) -> ConfigurationResult<()> {
        if definition.name.is_empty() {
            return Err(ConfigurationError::InvalidEntityType {
                reason: "entity type name must not be empty".to_string(),
            });
        }

        let name = definition.name.clone();
        let replaced = self.types.insert(name.clone(), definition).is_some();
        if replaced {
            info!(entity_type = %name, "Replaced entity type definition");
        } else {
            info!(entity_type = %name, "Registered entity type");
        }
        Ok(())
    }

    /// Builder-style registration.
    pub fn with_type(mut self, definition: EntityTypeDefinition) -> ConfigurationResult<Self> {
        self.register(definition)?;
        Ok(self)
    }

    /// Looks up a definition.
    pub fn get(&self, entity_type: &str) -> Option<&EntityTypeDefinition> {
        self.types.get(entity_type)
    }

    /// Looks up a definition that must exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::UnregisteredType` when the type is unknown.
    pub fn require(&self, entity_type: &str) -> ConfigurationResult<&EntityTypeDefinition> {
        self.types
            .get(entity_type)
            .ok_or_else(|| ConfigurationError::UnregisteredType {
                entity_type: entity_type.to_string(),
            })
    }

    /// Whether the type is registered.
    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    /// Next inheritance step for an entity; unregistered types inherit from default.
    ///
    /// # Errors
    ///
    /// Propagates the error of the type's inherit function.
    pub fn inherit_target(
        &self,
        entity: &EntityRef,
        context: &InheritContext,
    ) -> ConfigurationResult<InheritTarget> {
        match self.types.get(entity.entity_type()) {
            Some(definition) => definition.inherit_target(entity.entity_id(), context),
            None => Ok(InheritTarget::Default),
        }
    }

    /// Registered definitions in name order.
    pub fn definitions(&self) -> impl Iterator<Item = &EntityTypeDefinition> {
        self.types.values()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
