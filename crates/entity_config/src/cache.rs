//! Request-scoped document cache.
//!
//! A [`DocumentCache`] lives for exactly one bulk resolution. It maps keys to
//! the document that was found, or to an explicit "known missing" placeholder
//! so that a later lookup does not go back to the store.

use std::collections::HashMap;

use crate::document::ConfigDocument;
use crate::key::DocumentKey;

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;

/// Result of looking a key up in the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup<'a> {
    /// The key was fetched and the document exists.
    Found(&'a ConfigDocument),
    /// The key was fetched and no document exists.
    KnownMissing,
    /// The key was never fetched.
    Miss,
}

/// Documents fetched during one bulk resolution.
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    entries: HashMap<DocumentKey, Option<ConfigDocument>>,
}

impl DocumentCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cache from the result of one batched fetch.
    ///
    /// Every requested key that did not come back is recorded as known missing.
    pub fn from_fetch<I>(requested: &[DocumentKey], fetched: I) -> Self
    where
        I: IntoIterator<Item = ConfigDocument>,
    {
        let mut cache = Self::new();
        for document in fetched {
            cache.insert(document.key.clone(), Some(document));
        }
        for key in requested {
            cache.entries.entry(key.clone()).or_insert(None);
        }
        cache
    }

    /// Looks a key up.
    pub fn lookup(&self, key: &DocumentKey) -> CacheLookup<'_> {
        match self.entries.get(key) {
            Some(Some(document)) => CacheLookup::Found(document),
            Some(None) => CacheLookup::KnownMissing,
            None => CacheLookup::Miss,
        }
    }

    /// Records what the store returned for a key.
    pub fn insert(&mut self, key: DocumentKey, document: Option<ConfigDocument>) {
        self.entries.insert(key, document);
    }

    /// Number of cached keys, known-missing ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
