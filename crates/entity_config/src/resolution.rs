//! Effective configuration resolution.
//!
//! The [`ConfigurationResolver`] turns stored documents into the effective
//! configuration of an entity:
//!
//! 1. the entity's ancestor chain is walked through the registry,
//! 2. the default document, every ancestor document and the entity's own
//!    document are read,
//! 3. the documents are merged from the default up to the entity itself.
//!
//! The bulk path resolves every requested chain first, then reads all the
//! documents it needs in a single store query. Each entity is then merged
//! from a request-scoped [`DocumentCache`] exactly as the single-entity path
//! would merge it.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheLookup, DocumentCache};
use crate::document::{ConfigDocument, ConfigMap};
use crate::errors::ConfigurationResult;
use crate::inheritance::{AncestorChain, InheritanceResolver};
use crate::key::{DocumentKey, EntityRef};
use crate::merger::ConfigurationMerger;
use crate::registry::{EntityTypeRegistry, InheritContext};
use crate::settings::EngineSettings;
use crate::store::DocumentStore;

#[cfg(test)]
#[path = "resolution_tests.rs"]
mod tests;

/// Options for a read.
///
/// `context` is handed to every inherit function on the chain. `inherit` only
/// controls whether the chain is walked at all and is never part of the
/// context.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Merge ancestors and the default. When `false`, only the entity's own
    /// stored configuration is returned.
    pub inherit: bool,

    /// Caller-supplied context for inherit functions.
    pub context: InheritContext,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            inherit: true,
            context: InheritContext::new(),
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options returning only the entity's own configuration.
    pub fn without_inheritance() -> Self {
        Self {
            inherit: false,
            ..Self::default()
        }
    }

    /// Adds a context entry for inherit functions.
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Resolves effective configuration from a document store.
#[derive(Clone)]
pub struct ConfigurationResolver {
    store: Arc<dyn DocumentStore>,
    registry: Arc<EntityTypeRegistry>,
    merger: ConfigurationMerger,
    settings: EngineSettings,
}

impl ConfigurationResolver {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<EntityTypeRegistry>) -> Self {
        Self {
            store,
            registry,
            merger: ConfigurationMerger::new(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<EntityTypeRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Walks the ancestor chain of `entity`.
    pub fn ancestor_chain(
        &self,
        entity: &EntityRef,
        context: &InheritContext,
    ) -> ConfigurationResult<AncestorChain> {
        InheritanceResolver::new(&self.registry, self.settings.max_inheritance_depth)
            .resolve(entity, context)
            .map_err(|e| {
                warn!(entity = %entity, error = %e, "Failed to resolve inheritance chain");
                e
            })
    }

    /// Effective configuration of one entity.
    ///
    /// Returns an empty map when no document exists at any level.
    pub async fn get_for_entity(
        &self,
        entity: &EntityRef,
        options: &ResolveOptions,
    ) -> ConfigurationResult<ConfigMap> {
        Ok(self
            .get_document_for_entity(entity, options)
            .await?
            .map(|document| document.config)
            .unwrap_or_default())
    }

    /// Effective document of one entity.
    ///
    /// With inheritance the merged document is always returned and its key is
    /// always the entity's own key, even when only an ancestor or the default
    /// exists. Without inheritance the raw own document is returned, if any.
    #[instrument(skip(self, entity, options), fields(entity = %entity, inherit = options.inherit))]
    pub async fn get_document_for_entity(
        &self,
        entity: &EntityRef,
        options: &ResolveOptions,
    ) -> ConfigurationResult<Option<ConfigDocument>> {
        if !options.inherit {
            return self.store.find_one(&entity.key()).await;
        }

        let chain = self.ancestor_chain(entity, &options.context)?;
        let mut cache = DocumentCache::new();
        let document = self.merge_entity(entity, &chain, &mut cache, false).await?;

        debug!(ancestors = chain.len(), "Resolved entity configuration");
        Ok(Some(document))
    }

    /// Effective configuration of many entities, index-aligned with
    /// `entities`.
    ///
    /// Entities without any document yield an empty map at their index. All
    /// documents are read in one store query; nothing is read for an empty
    /// request.
    #[instrument(skip(self, entities, options), fields(count = entities.len(), inherit = options.inherit))]
    pub async fn get_for_entities(
        &self,
        entities: &[EntityRef],
        options: &ResolveOptions,
    ) -> ConfigurationResult<Vec<ConfigMap>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        if !options.inherit {
            let keys: Vec<DocumentKey> = entities.iter().map(EntityRef::key).collect();
            let fetched = self.store.find_many(&keys).await?;
            let cache = DocumentCache::from_fetch(&keys, fetched);

            return Ok(keys
                .iter()
                .map(|key| match cache.lookup(key) {
                    CacheLookup::Found(document) => document.config.clone(),
                    CacheLookup::KnownMissing | CacheLookup::Miss => ConfigMap::new(),
                })
                .collect());
        }

        let chains = entities
            .iter()
            .map(|entity| self.ancestor_chain(entity, &options.context))
            .collect::<ConfigurationResult<Vec<_>>>()?;

        let keys = required_keys(entities, &chains);
        let fetched = self.store.find_many(&keys).await?;
        let mut cache = DocumentCache::from_fetch(&keys, fetched);
        debug!(
            keys = keys.len(),
            cached = cache.len(),
            "Fetched documents for bulk resolution"
        );

        let mut results = Vec::with_capacity(entities.len());
        for (entity, chain) in entities.iter().zip(&chains) {
            let document = self
                .merge_entity(entity, chain, &mut cache, self.settings.warn_on_cache_miss)
                .await?;
            results.push(document.config);
        }
        Ok(results)
    }

    /// The default document's configuration, if the default exists.
    pub async fn get_default(&self) -> ConfigurationResult<Option<ConfigMap>> {
        Ok(self
            .store
            .find_one(&DocumentKey::default_document())
            .await?
            .map(|document| document.config))
    }

    /// Whether the default document exists.
    pub async fn has_default(&self) -> ConfigurationResult<bool> {
        Ok(self.get_default().await?.is_some())
    }

    /// Whether the default document exists and has a top-level `prefix` field.
    pub async fn has_default_for_prefix(&self, prefix: &str) -> ConfigurationResult<bool> {
        Ok(self
            .get_default()
            .await?
            .is_some_and(|config| config.contains_key(prefix)))
    }

    /// Merges default, ancestors (most distant first) and the entity's own
    /// document, reading each through `cache`.
    async fn merge_entity(
        &self,
        entity: &EntityRef,
        chain: &AncestorChain,
        cache: &mut DocumentCache,
        warn_on_miss: bool,
    ) -> ConfigurationResult<ConfigDocument> {
        let mut layers: Vec<ConfigMap> = Vec::with_capacity(chain.len() + 2);

        let default_key = DocumentKey::default_document();
        if let Some(document) = self.cached_document(cache, &default_key, warn_on_miss).await? {
            layers.push(document.config);
        }
        for ancestor in chain.root_first() {
            if let Some(document) = self
                .cached_document(cache, &ancestor.key(), warn_on_miss)
                .await?
            {
                layers.push(document.config);
            }
        }
        if let Some(document) = self
            .cached_document(cache, &entity.key(), warn_on_miss)
            .await?
        {
            layers.push(document.config);
        }

        let merged = self.merger.merge_layers(layers.iter());
        Ok(ConfigDocument::for_entity(entity, merged))
    }

    /// Reads `key` from `cache`, falling back to the store on a miss and
    /// recording the answer so the key is never read twice.
    async fn cached_document(
        &self,
        cache: &mut DocumentCache,
        key: &DocumentKey,
        warn_on_miss: bool,
    ) -> ConfigurationResult<Option<ConfigDocument>> {
        match cache.lookup(key) {
            CacheLookup::Found(document) => return Ok(Some(document.clone())),
            CacheLookup::KnownMissing => return Ok(None),
            CacheLookup::Miss => {}
        }

        if warn_on_miss {
            warn!(key = %key, "Document cache miss; reading from the store");
        }
        let document = self.store.find_one(key).await?;
        cache.insert(key.clone(), document.clone());
        Ok(document)
    }
}

impl std::fmt::Debug for ConfigurationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationResolver")
            .field("store", &"<DocumentStore>")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Distinct keys needed to merge every entity: the default, each entity's own
/// key and each ancestor key, in first-seen order.
fn required_keys(entities: &[EntityRef], chains: &[AncestorChain]) -> Vec<DocumentKey> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    let candidates = std::iter::once(DocumentKey::default_document()).chain(
        entities
            .iter()
            .zip(chains)
            .flat_map(|(entity, chain)| std::iter::once(entity.key()).chain(chain.keys())),
    );
    for key in candidates {
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    keys
}
