//! Authorization shim for remote callers.
//!
//! [`AccessControlledConfiguration`] exposes the manager's operations to
//! callers that must be authorized first. Entity reads and writes run the
//! entity type's write predicate. Default-document writes run a separate
//! predicate, which denies everyone unless one is configured. The caller is
//! always passed explicitly and is recorded as the acting user of any write.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::document::ConfigMap;
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::key::{EntityRef, DEFAULT_KEY};
use crate::manager::{Actor, EntityConfigurationManager};
use crate::publication::PublicationFilter;
use crate::resolution::ResolveOptions;
use crate::store::WriteResult;

#[cfg(test)]
#[path = "access_tests.rs"]
mod tests;

/// Predicate deciding whether a caller may edit the default document.
pub type DefaultWritePredicate = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// Access-checked wrapper around an [`EntityConfigurationManager`].
///
/// # Examples
///
/// ```rust
/// use entity_config::{
///     AccessControlledConfiguration, EntityConfigurationManager, EntityTypeDefinition,
///     EntityTypeRegistry, InMemoryDocumentStore,
/// };
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), entity_config::ConfigurationError> {
/// let registry = EntityTypeRegistry::new().with_type(
///     EntityTypeDefinition::new("user")
///         .with_write_permission(|caller, id| caller == Some(id)),
/// )?;
/// let manager = EntityConfigurationManager::new(
///     Arc::new(InMemoryDocumentStore::new()),
///     Arc::new(registry),
/// );
///
/// let api = AccessControlledConfiguration::new(Arc::new(manager))
///     .with_default_write_permission(|caller| caller == Some("admin"));
/// # Ok(())
/// # }
/// ```
pub struct AccessControlledConfiguration {
    manager: Arc<EntityConfigurationManager>,
    default_write: Option<DefaultWritePredicate>,
}

impl AccessControlledConfiguration {
    pub fn new(manager: Arc<EntityConfigurationManager>) -> Self {
        Self {
            manager,
            default_write: None,
        }
    }

    /// Allows default-document edits for callers accepted by `predicate`.
    pub fn with_default_write_permission<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.default_write = Some(Arc::new(predicate));
        self
    }

    pub fn manager(&self) -> &Arc<EntityConfigurationManager> {
        &self.manager
    }

    /// Effective configuration of `entity`, if `caller` may edit it.
    #[instrument(skip(self, entity, options), fields(entity = %entity))]
    pub async fn get_for_entity(
        &self,
        caller: Option<&str>,
        entity: &EntityRef,
        options: &ResolveOptions,
    ) -> ConfigurationResult<ConfigMap> {
        self.authorize_entity(caller, entity)?;
        self.manager.get_for_entity(entity, options).await
    }

    /// Writes `entity`'s own configuration on behalf of `caller`.
    #[instrument(skip(self, entity, props), fields(entity = %entity))]
    pub async fn set_for_entity(
        &self,
        caller: Option<&str>,
        entity: &EntityRef,
        props: ConfigMap,
        overwrite: bool,
    ) -> ConfigurationResult<WriteResult> {
        self.authorize_entity(caller, entity)?;
        self.manager
            .set_for_entity_as(entity, props, overwrite, Actor::Known(caller.map(String::from)))
            .await
    }

    /// Replaces the default configuration on behalf of `caller`.
    pub async fn set_default(
        &self,
        caller: Option<&str>,
        config: ConfigMap,
    ) -> ConfigurationResult<WriteResult> {
        self.authorize_default(caller)?;
        self.manager
            .set_default_as(config, Actor::Known(caller.map(String::from)))
            .await
    }

    /// Replaces `config.<prefix>` of the default on behalf of `caller`.
    pub async fn set_default_for_prefix(
        &self,
        caller: Option<&str>,
        prefix: &str,
        data: Value,
    ) -> ConfigurationResult<WriteResult> {
        self.authorize_default(caller)?;
        self.manager
            .set_default_for_prefix_as(prefix, data, Actor::Known(caller.map(String::from)))
            .await
    }

    /// Filter selecting the documents `caller` may observe.
    pub fn publication_filter(&self, caller: Option<&str>) -> PublicationFilter {
        self.manager.publication_filter(caller)
    }

    fn authorize_entity(&self, caller: Option<&str>, entity: &EntityRef) -> ConfigurationResult<()> {
        let definition = self.manager.registry().require(entity.entity_type())?;
        if definition.can_write(caller, entity.entity_id()) {
            return Ok(());
        }

        warn!(caller = ?caller, entity = %entity, "Access denied");
        Err(ConfigurationError::AccessDenied {
            user_id: caller.map(String::from),
            entity_type: entity.entity_type().to_string(),
            entity_id: entity.entity_id().to_string(),
        })
    }

    fn authorize_default(&self, caller: Option<&str>) -> ConfigurationResult<()> {
        let allowed = self
            .default_write
            .as_ref()
            .is_some_and(|predicate| predicate(caller));
        if allowed {
            return Ok(());
        }

        warn!(caller = ?caller, "Access denied to the default configuration");
        Err(ConfigurationError::AccessDenied {
            user_id: caller.map(String::from),
            entity_type: DEFAULT_KEY.to_string(),
            entity_id: DEFAULT_KEY.to_string(),
        })
    }
}

impl fmt::Debug for AccessControlledConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControlledConfiguration")
            .field("manager", &self.manager)
            .field("default_write", &self.default_write.as_ref().map(|_| "Fn"))
            .finish()
    }
}
