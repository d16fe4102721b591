//! In-memory document store.
//!
//! A complete [`DocumentStore`] kept in process memory. Documents are held in
//! their stored JSON form behind an `Arc<RwLock<HashMap>>`, so a clone of the
//! store shares the same data. Every operation takes the lock once, which
//! makes each write atomic relative to one key.
//!
//! The store counts read round trips, which makes "one query per bulk
//! resolution" observable in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::document::ConfigDocument;
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::key::DocumentKey;
use crate::operation::UpdateOperation;
use crate::publication::PublicationFilter;
use crate::store::{DocumentStore, WriteResult};

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;

/// Read round trips observed by an [`InMemoryDocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadStats {
    /// Calls to `find_one`.
    pub find_one: usize,
    /// Calls to `find_many`.
    pub find_many: usize,
}

impl ReadStats {
    /// Total read round trips.
    pub fn total(&self) -> usize {
        self.find_one + self.find_many
    }
}

/// Document store backed by a shared in-memory map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<DocumentKey, Value>>>,
    find_one_calls: Arc<AtomicUsize>,
    find_many_calls: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `documents`.
    pub fn with_documents<I>(documents: I) -> ConfigurationResult<Self>
    where
        I: IntoIterator<Item = ConfigDocument>,
    {
        let store = Self::new();
        {
            let mut map = store.documents.write().unwrap_or_else(PoisonError::into_inner);
            for document in documents {
                map.insert(document.key.clone(), document.to_value()?);
            }
        }
        Ok(store)
    }

    /// Read round trips since creation or the last reset.
    pub fn read_stats(&self) -> ReadStats {
        ReadStats {
            find_one: self.find_one_calls.load(Ordering::SeqCst),
            find_many: self.find_many_calls.load(Ordering::SeqCst),
        }
    }

    /// Resets the read counters.
    pub fn reset_read_stats(&self) {
        self.find_one_calls.store(0, Ordering::SeqCst);
        self.find_many_calls.store(0, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_document(
        map: &HashMap<DocumentKey, Value>,
        key: &DocumentKey,
    ) -> ConfigurationResult<Option<ConfigDocument>> {
        map.get(key)
            .cloned()
            .map(ConfigDocument::from_value)
            .transpose()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_one(&self, key: &DocumentKey) -> ConfigurationResult<Option<ConfigDocument>> {
        self.find_one_calls.fetch_add(1, Ordering::SeqCst);
        let map = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Self::read_document(&map, key)
    }

    async fn find_many(&self, keys: &[DocumentKey]) -> ConfigurationResult<Vec<ConfigDocument>> {
        self.find_many_calls.fetch_add(1, Ordering::SeqCst);
        let map = self.documents.read().unwrap_or_else(PoisonError::into_inner);

        let mut documents = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for key in keys {
            if !seen.insert(key) {
                continue;
            }
            if let Some(document) = Self::read_document(&map, key)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    async fn find_by_filter(
        &self,
        filter: &PublicationFilter,
    ) -> ConfigurationResult<Vec<ConfigDocument>> {
        let map = self.documents.read().unwrap_or_else(PoisonError::into_inner);

        let mut documents = Vec::new();
        for value in map.values() {
            let document = ConfigDocument::from_value(value.clone())?;
            if filter.matches(&document) {
                documents.push(document);
            }
        }
        documents.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(documents)
    }

    async fn upsert(
        &self,
        key: &DocumentKey,
        operation: &UpdateOperation,
    ) -> ConfigurationResult<WriteResult> {
        let mut map = self.documents.write().unwrap_or_else(PoisonError::into_inner);

        let (mut document, created) = match map.get(key) {
            Some(existing) => (existing.clone(), false),
            None => (ConfigDocument::empty(key.clone()).to_value()?, true),
        };
        let before = document.clone();
        operation.apply_to(&mut document);

        // The result must still read back as a document before it is committed.
        ConfigDocument::from_value(document.clone())?;
        let modified = created || before != document;
        map.insert(key.clone(), document);

        debug!(key = %key, created, "Upserted document");
        Ok(WriteResult {
            matched_count: u64::from(!created),
            modified_count: u64::from(modified && !created),
            upserted_key: created.then(|| key.clone()),
        })
    }

    async fn insert(&self, document: ConfigDocument) -> ConfigurationResult<WriteResult> {
        let mut map = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&document.key) {
            return Err(ConfigurationError::StoreConflict {
                key: document.key.to_string(),
            });
        }

        let key = document.key.clone();
        map.insert(key.clone(), document.to_value()?);
        Ok(WriteResult {
            matched_count: 0,
            modified_count: 0,
            upserted_key: Some(key),
        })
    }

    async fn update(
        &self,
        key: &DocumentKey,
        operation: &UpdateOperation,
    ) -> ConfigurationResult<WriteResult> {
        let mut map = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = map.get(key) else {
            return Ok(WriteResult::default());
        };

        let mut document = existing.clone();
        operation.apply_to(&mut document);
        ConfigDocument::from_value(document.clone())?;
        let modified = *existing != document;
        map.insert(key.clone(), document);

        Ok(WriteResult {
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_key: None,
        })
    }
}
