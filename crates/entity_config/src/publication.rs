//! Publication filters for configuration subscriptions.
//!
//! A [`PublicationFilter`] selects the documents a caller may observe: the
//! global default document, plus for every registered entity type the ids
//! returned by that type's publish selector. The filter is recomputed for
//! every request, so identity or registry changes are always reflected. It is
//! evaluated by the document store, not by the resolver.

use std::collections::BTreeSet;

use crate::document::ConfigDocument;
use crate::key::DocumentKey;
use crate::registry::EntityTypeRegistry;

#[cfg(test)]
#[path = "publication_tests.rs"]
mod tests;

/// One clause of a publication filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicationSelector {
    /// The global default document.
    DefaultDocument,
    /// Documents of one entity type with the listed ids.
    Entities {
        entity_type: String,
        entity_ids: BTreeSet<String>,
    },
}

/// Documents a caller may observe; a document matches if any clause matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationFilter {
    selectors: Vec<PublicationSelector>,
}

impl PublicationFilter {
    /// Computes the filter for `user_id` from every registered publish selector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use entity_config::{EntityTypeDefinition, EntityTypeRegistry, PublicationFilter};
    ///
    /// let registry = EntityTypeRegistry::new()
    ///     .with_type(
    ///         EntityTypeDefinition::new("user")
    ///             .with_publish(|user| user.map(|u| vec![u.to_string()]).unwrap_or_default()),
    ///     )?;
    ///
    /// let filter = PublicationFilter::for_user(&registry, Some("42"));
    /// let keys: Vec<String> = filter.keys().iter().map(|k| k.to_string()).collect();
    /// assert_eq!(keys, vec!["_default", "user_42"]);
    /// # Ok::<(), entity_config::ConfigurationError>(())
    /// ```
    pub fn for_user(registry: &EntityTypeRegistry, user_id: Option<&str>) -> Self {
        let mut selectors = vec![PublicationSelector::DefaultDocument];

        for definition in registry.definitions() {
            let entity_ids: BTreeSet<String> =
                definition.published_ids(user_id).into_iter().collect();
            if entity_ids.is_empty() {
                continue;
            }
            selectors.push(PublicationSelector::Entities {
                entity_type: definition.name().to_string(),
                entity_ids,
            });
        }

        Self { selectors }
    }

    /// The filter's clauses.
    pub fn selectors(&self) -> &[PublicationSelector] {
        &self.selectors
    }

    /// Whether `document` is visible under this filter.
    pub fn matches(&self, document: &ConfigDocument) -> bool {
        self.selectors.iter().any(|selector| match selector {
            PublicationSelector::DefaultDocument => document.key.is_default(),
            PublicationSelector::Entities {
                entity_type,
                entity_ids,
            } => document.entity_type == *entity_type && entity_ids.contains(&document.entity_id),
        })
    }

    /// Every document key the filter can select.
    pub fn keys(&self) -> Vec<DocumentKey> {
        let mut keys = Vec::new();
        for selector in &self.selectors {
            match selector {
                PublicationSelector::DefaultDocument => keys.push(DocumentKey::default_document()),
                PublicationSelector::Entities {
                    entity_type,
                    entity_ids,
                } => keys.extend(
                    entity_ids
                        .iter()
                        .map(|entity_id| DocumentKey::for_entity(entity_type, entity_id)),
                ),
            }
        }
        keys
    }
}
