//! Entity configuration manager.
//!
//! The `EntityConfigurationManager` is the public face of the engine. It ties
//! together:
//! - `ConfigurationResolver` for merged reads
//! - `WriteNormalizer` for turning caller updates into storage operations
//! - `ForbiddenFieldGuard` and an optional `ConfigurationSchema` for
//!   pre-write validation
//! - `UpdateNotifier` for after-update events
//! - `IdentityProvider` for naming the acting user in those events
//!
//! # Usage
//!
//! ```rust
//! use entity_config::{
//!     EntityConfigurationManager, EntityRef, EntityTypeDefinition, EntityTypeRegistry,
//!     InMemoryDocumentStore, InheritTarget, ResolveOptions,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), entity_config::ConfigurationError> {
//! let registry = EntityTypeRegistry::new()
//!     .with_type(EntityTypeDefinition::new("organization"))?
//!     .with_type(
//!         EntityTypeDefinition::new("user")
//!             .inherit_with(|_id, _ctx| InheritTarget::entity("organization", "acme")),
//!     )?;
//!
//! let manager = EntityConfigurationManager::new(
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(registry),
//! );
//!
//! let defaults = json!({ "theme": "light" });
//! manager.set_default(defaults.as_object().cloned().unwrap_or_default()).await?;
//!
//! let user = EntityRef::new("user", "42");
//! let config = manager.get_for_entity(&user, &ResolveOptions::new()).await?;
//! assert_eq!(config.get("theme"), Some(&json!("light")));
//! # Ok(())
//! # }
//! ```

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::document::{ConfigDocument, ConfigMap};
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::events::{AfterUpdateEvent, UpdateNotifier};
use crate::identity::{AnonymousIdentity, IdentityProvider};
use crate::key::{DocumentKey, EntityRef, DEFAULT_KEY};
use crate::operation::UpdateOperation;
use crate::publication::PublicationFilter;
use crate::registry::EntityTypeRegistry;
use crate::resolution::{ConfigurationResolver, ResolveOptions};
use crate::schema::ConfigurationSchema;
use crate::settings::EngineSettings;
use crate::store::{DocumentStore, WriteResult};
use crate::validator::ForbiddenFieldGuard;
use crate::write_normalizer::WriteNormalizer;

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

/// Who performed a write, as recorded in the after-update event.
#[derive(Debug, Clone)]
pub(crate) enum Actor {
    /// Ask the identity provider.
    Current,
    /// Already known to the caller.
    Known(Option<String>),
}

/// Whether the forbidden-field guard applies to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trust {
    Caller,
    Internal,
}

/// Entity configuration manager.
///
/// Reads return merged configuration; writes only ever touch the target's own
/// document (or the default document) and emit exactly one after-update event
/// once the store has acknowledged them.
pub struct EntityConfigurationManager {
    resolver: ConfigurationResolver,
    normalizer: WriteNormalizer,
    guard: ForbiddenFieldGuard,
    schema: Option<ConfigurationSchema>,
    notifier: Arc<UpdateNotifier>,
    identity: Arc<dyn IdentityProvider>,
}

impl EntityConfigurationManager {
    /// Creates a manager with default settings, no schema, an anonymous
    /// identity and its own notifier.
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<EntityTypeRegistry>) -> Self {
        let settings = EngineSettings::default();
        Self {
            normalizer: WriteNormalizer::new(settings.remove_empty_strings),
            resolver: ConfigurationResolver::new(store, registry).with_settings(settings),
            guard: ForbiddenFieldGuard::new(),
            schema: None,
            notifier: Arc::new(UpdateNotifier::new()),
            identity: Arc::new(AnonymousIdentity),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.normalizer = WriteNormalizer::new(settings.remove_empty_strings);
        self.resolver = self.resolver.with_settings(settings);
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    /// Shares an existing notifier, so several managers feed the same
    /// listeners.
    pub fn with_notifier(mut self, notifier: Arc<UpdateNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Validates every write against `schema`.
    pub fn with_schema(mut self, schema: ConfigurationSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn registry(&self) -> &Arc<EntityTypeRegistry> {
        self.resolver.registry()
    }

    pub fn notifier(&self) -> &Arc<UpdateNotifier> {
        &self.notifier
    }

    pub fn settings(&self) -> &EngineSettings {
        self.resolver.settings()
    }

    /// Convenience handle scoped to one registered entity type.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::UnregisteredType` for unknown names.
    pub fn entity_type(&self, name: &str) -> ConfigurationResult<EntityTypeHandle<'_>> {
        self.registry().require(name)?;
        Ok(EntityTypeHandle {
            manager: self,
            entity_type: name.to_string(),
        })
    }

    // ----------------------------------------------------------------------
    // Reads
    // ----------------------------------------------------------------------

    /// Effective configuration of one entity. See
    /// [`ConfigurationResolver::get_for_entity`].
    pub async fn get_for_entity(
        &self,
        entity: &EntityRef,
        options: &ResolveOptions,
    ) -> ConfigurationResult<ConfigMap> {
        self.resolver.get_for_entity(entity, options).await
    }

    /// Effective document of one entity, key forced to the entity's own key.
    pub async fn get_document_for_entity(
        &self,
        entity: &EntityRef,
        options: &ResolveOptions,
    ) -> ConfigurationResult<Option<ConfigDocument>> {
        self.resolver.get_document_for_entity(entity, options).await
    }

    /// Effective configuration of many entities, index-aligned with the input.
    pub async fn get_for_entities(
        &self,
        entities: &[EntityRef],
        options: &ResolveOptions,
    ) -> ConfigurationResult<Vec<ConfigMap>> {
        self.resolver.get_for_entities(entities, options).await
    }

    pub async fn get_default(&self) -> ConfigurationResult<Option<ConfigMap>> {
        self.resolver.get_default().await
    }

    pub async fn has_default(&self) -> ConfigurationResult<bool> {
        self.resolver.has_default().await
    }

    pub async fn has_default_for_prefix(&self, prefix: &str) -> ConfigurationResult<bool> {
        self.resolver.has_default_for_prefix(prefix).await
    }

    /// Filter selecting the documents `user_id` may observe.
    pub fn publication_filter(&self, user_id: Option<&str>) -> PublicationFilter {
        PublicationFilter::for_user(self.registry(), user_id)
    }

    /// Raw stored documents `user_id` may observe.
    pub async fn published_documents(
        &self,
        user_id: Option<&str>,
    ) -> ConfigurationResult<Vec<ConfigDocument>> {
        let filter = self.publication_filter(user_id);
        self.resolver.store().find_by_filter(&filter).await
    }

    // ----------------------------------------------------------------------
    // Writes
    // ----------------------------------------------------------------------

    /// Writes an entity's own configuration.
    ///
    /// With `overwrite` the whole stored `config` is replaced by `props`.
    /// Otherwise `props` is applied field by field and a `null` leaf reverts
    /// that field to its inherited value.
    ///
    /// # Errors
    ///
    /// - `UnregisteredType` if the entity type was never registered
    /// - `InvalidEntityReference` if the id would make the key ambiguous
    /// - `ValidationFailed` for forbidden fields or schema violations
    /// - store errors, unchanged
    pub async fn set_for_entity(
        &self,
        entity: &EntityRef,
        props: ConfigMap,
        overwrite: bool,
    ) -> ConfigurationResult<WriteResult> {
        self.write_entity(entity, props, overwrite, Trust::Caller, Actor::Current)
            .await
    }

    /// Like [`set_for_entity`](Self::set_for_entity) but for internal code:
    /// forbidden fields are not checked. The schema still applies.
    pub async fn set_for_entity_trusted(
        &self,
        entity: &EntityRef,
        props: ConfigMap,
        overwrite: bool,
    ) -> ConfigurationResult<WriteResult> {
        self.write_entity(entity, props, overwrite, Trust::Internal, Actor::Current)
            .await
    }

    /// Replaces the default document's whole configuration.
    pub async fn set_default(&self, config: ConfigMap) -> ConfigurationResult<WriteResult> {
        self.set_default_as(config, Actor::Current).await
    }

    /// Replaces the single default field `config.<prefix>` with `data`.
    pub async fn set_default_for_prefix(
        &self,
        prefix: &str,
        data: Value,
    ) -> ConfigurationResult<WriteResult> {
        self.set_default_for_prefix_as(prefix, data, Actor::Current)
            .await
    }

    pub(crate) async fn set_for_entity_as(
        &self,
        entity: &EntityRef,
        props: ConfigMap,
        overwrite: bool,
        actor: Actor,
    ) -> ConfigurationResult<WriteResult> {
        self.write_entity(entity, props, overwrite, Trust::Caller, actor)
            .await
    }

    #[instrument(skip(self, config, actor))]
    pub(crate) async fn set_default_as(
        &self,
        config: ConfigMap,
        actor: Actor,
    ) -> ConfigurationResult<WriteResult> {
        let operation = self.normalizer.default_operation(config);
        self.check_schema(DEFAULT_KEY, &operation)?;
        self.commit(DocumentKey::default_document(), operation, actor)
            .await
    }

    #[instrument(skip(self, data, actor))]
    pub(crate) async fn set_default_for_prefix_as(
        &self,
        prefix: &str,
        data: Value,
        actor: Actor,
    ) -> ConfigurationResult<WriteResult> {
        let operation = self.normalizer.prefix_operation(prefix, data).map_err(|e| {
            warn!("Rejected default prefix write: {}", e);
            e
        })?;
        self.check_schema(DEFAULT_KEY, &operation)?;
        self.commit(DocumentKey::default_document(), operation, actor)
            .await
    }

    #[instrument(skip(self, entity, props, trust, actor), fields(entity = %entity))]
    async fn write_entity(
        &self,
        entity: &EntityRef,
        props: ConfigMap,
        overwrite: bool,
        trust: Trust,
        actor: Actor,
    ) -> ConfigurationResult<WriteResult> {
        self.registry().require(entity.entity_type()).map_err(|e| {
            warn!("Rejected write to unregistered type: {}", e);
            e
        })?;
        entity.validate()?;

        let operation = self.normalizer.entity_operation(entity, props, overwrite);
        let key = entity.key();

        if trust == Trust::Caller {
            self.guard.check(self.registry(), &key, &operation)?;
        }
        self.check_schema(entity.entity_type(), &operation)?;

        self.commit(key, operation, actor).await
    }

    fn check_schema(
        &self,
        entity_type: &str,
        operation: &UpdateOperation,
    ) -> ConfigurationResult<()> {
        let Some(schema) = &self.schema else {
            return Ok(());
        };

        schema
            .validate(&operation.config_projection())
            .map_err(|errors| {
                warn!(
                    entity_type,
                    error_count = errors.len(),
                    "Write rejected by configuration schema"
                );
                ConfigurationError::ValidationFailed {
                    entity_type: entity_type.to_string(),
                    error_count: errors.len(),
                    errors,
                }
            })
    }

    /// Upserts `operation` at `key` and emits the after-update event.
    async fn commit(
        &self,
        key: DocumentKey,
        operation: UpdateOperation,
        actor: Actor,
    ) -> ConfigurationResult<WriteResult> {
        let result = self
            .resolver
            .store()
            .upsert(&key, &operation)
            .await
            .map_err(|e| {
                warn!(key = %key, "Failed to write configuration: {}", e);
                e
            })?;

        info!(
            key = %key,
            matched = result.matched_count,
            modified = result.modified_count,
            created = result.upserted_key.is_some(),
            "Configuration written"
        );

        let user_id = self.acting_user(actor).await;
        let event = AfterUpdateEvent::new(user_id, key, operation, result.clone());
        let delivered = self.notifier.emit(&event);
        debug!(delivered, "After-update listeners notified");

        Ok(result)
    }

    async fn acting_user(&self, actor: Actor) -> Option<String> {
        match actor {
            Actor::Known(user_id) => user_id,
            Actor::Current => match self.identity.current_user_id().await {
                Ok(user_id) => user_id,
                Err(e) => {
                    warn!("Acting user unavailable, recording unknown user: {}", e);
                    None
                }
            },
        }
    }
}

impl fmt::Debug for EntityConfigurationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfigurationManager")
            .field("resolver", &self.resolver)
            .field("normalizer", &self.normalizer)
            .field("schema", &self.schema.is_some())
            .field("notifier", &self.notifier)
            .field("identity", &"<IdentityProvider>")
            .finish()
    }
}

/// Reads and writes scoped to one registered entity type.
///
/// Obtained from [`EntityConfigurationManager::entity_type`].
#[derive(Debug, Clone)]
pub struct EntityTypeHandle<'a> {
    manager: &'a EntityConfigurationManager,
    entity_type: String,
}

impl EntityTypeHandle<'_> {
    pub fn name(&self) -> &str {
        &self.entity_type
    }

    fn entity(&self, entity_id: &str) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), entity_id)
    }

    pub async fn get(
        &self,
        entity_id: &str,
        options: &ResolveOptions,
    ) -> ConfigurationResult<ConfigMap> {
        self.manager
            .get_for_entity(&self.entity(entity_id), options)
            .await
    }

    pub async fn get_document(
        &self,
        entity_id: &str,
        options: &ResolveOptions,
    ) -> ConfigurationResult<Option<ConfigDocument>> {
        self.manager
            .get_document_for_entity(&self.entity(entity_id), options)
            .await
    }

    pub async fn set(
        &self,
        entity_id: &str,
        props: ConfigMap,
        overwrite: bool,
    ) -> ConfigurationResult<WriteResult> {
        self.manager
            .set_for_entity(&self.entity(entity_id), props, overwrite)
            .await
    }
}
