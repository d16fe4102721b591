//! Hierarchical configuration for named entities.
//!
//! Every entity (a user, an organization, ...) owns a partial configuration
//! document. Its effective configuration is the global default document,
//! overlaid by each ancestor's document, overlaid by its own. Ancestors come
//! from a per-type inherit function registered in an [`EntityTypeRegistry`].
//!
//! Writers only ever touch an entity's own document (or the default). Partial
//! writes are flattened into dot-path updates and a `null` leaf returns a
//! field to its inherited value.
//!
//! See [`EntityConfigurationManager`] for the main entry point.

// Keys, documents and storage
pub mod document;
pub mod key;
pub mod memory_store;
pub mod operation;
pub mod store;

// Entity types and inheritance
pub mod inheritance;
pub mod registry;

// Resolution
pub mod cache;
pub mod merger;
pub mod resolution;

// Writes and validation
pub mod schema;
pub mod validator;
pub mod write_normalizer;

// Orchestration
pub mod access;
pub mod events;
pub mod identity;
pub mod manager;
pub mod publication;

pub mod errors;
pub mod settings;

#[cfg(test)]
mod integration_tests;

pub use access::{AccessControlledConfiguration, DefaultWritePredicate};
pub use cache::{CacheLookup, DocumentCache};
pub use document::{ConfigDocument, ConfigMap};
pub use errors::{ConfigurationError, ConfigurationResult};
pub use events::{AfterUpdateEvent, ListenerId, UpdateListener, UpdateNotifier};
pub use identity::{AnonymousIdentity, IdentityProvider, StaticIdentity};
pub use inheritance::{AncestorChain, InheritanceResolver};
pub use key::{DocumentKey, EntityRef, DEFAULT_KEY, KEY_SEPARATOR};
pub use manager::{EntityConfigurationManager, EntityTypeHandle};
pub use memory_store::{InMemoryDocumentStore, ReadStats};
pub use merger::ConfigurationMerger;
pub use operation::UpdateOperation;
pub use publication::{PublicationFilter, PublicationSelector};
pub use registry::{
    EntityTypeDefinition, EntityTypeRegistry, InheritContext, InheritFn, InheritTarget,
    PublishSelector, WritePredicate,
};
pub use resolution::{ConfigurationResolver, ResolveOptions};
pub use schema::ConfigurationSchema;
pub use settings::{EngineSettings, DEFAULT_MAX_INHERITANCE_DEPTH};
pub use store::{DocumentStore, WriteResult};
pub use validator::{ForbiddenFieldGuard, ValidationError, ValidationErrorType};
pub use write_normalizer::{validate_prefix, WriteNormalizer};
