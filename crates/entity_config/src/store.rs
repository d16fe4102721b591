//! Document store interface.
//!
//! This module defines the abstract interface to the store that persists
//! configuration documents. The resolver and the write path only ever talk to
//! the store through [`DocumentStore`]; they read documents, merge or
//! transform them, and discard them per request.
//!
//! # Error Handling
//!
//! All methods return `ConfigurationResult<T>`. Implementations map their own
//! failures to `ConfigurationError::StoreConflict` or
//! `ConfigurationError::StoreFailure`. Those errors propagate to the caller
//! unchanged; nothing above the store retries.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync` so one store can back concurrent
//! resolutions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::ConfigDocument;
use crate::errors::ConfigurationResult;
use crate::key::DocumentKey;
use crate::operation::UpdateOperation;
use crate::publication::PublicationFilter;

/// Raw result of a storage write.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteResult {
    /// Number of existing documents the write matched.
    pub matched_count: u64,

    /// Number of documents the write changed.
    pub modified_count: u64,

    /// Key of the document an upsert created, if it created one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upserted_key: Option<DocumentKey>,
}

/// Abstract interface for persisting configuration documents.
///
/// # Examples
///
/// ```no_run
/// use entity_config::{DocumentKey, DocumentStore};
///
/// async fn has_default(store: &dyn DocumentStore) -> bool {
///     store
///         .find_one(&DocumentKey::default_document())
///         .await
///         .map(|doc| doc.is_some())
///         .unwrap_or(false)
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document by key.
    async fn find_one(&self, key: &DocumentKey) -> ConfigurationResult<Option<ConfigDocument>>;

    /// Reads every existing document among `keys` in a single round trip.
    ///
    /// Missing keys are simply absent from the result; order is unspecified.
    async fn find_many(&self, keys: &[DocumentKey]) -> ConfigurationResult<Vec<ConfigDocument>>;

    /// Reads every document matching a publication filter.
    async fn find_by_filter(
        &self,
        filter: &PublicationFilter,
    ) -> ConfigurationResult<Vec<ConfigDocument>>;

    /// Applies `operation` to the document at `key`, creating it first if needed.
    ///
    /// `$set` and `$unset` are applied atomically.
    async fn upsert(
        &self,
        key: &DocumentKey,
        operation: &UpdateOperation,
    ) -> ConfigurationResult<WriteResult>;

    /// Inserts a new document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::StoreConflict` if the key already exists.
    async fn insert(&self, document: ConfigDocument) -> ConfigurationResult<WriteResult>;

    /// Applies `operation` to an existing document; never creates one.
    async fn update(
        &self,
        key: &DocumentKey,
        operation: &UpdateOperation,
    ) -> ConfigurationResult<WriteResult>;
}
