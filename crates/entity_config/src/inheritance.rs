//! Inheritance chain resolution.
//!
//! Walks the registry's inherit relation from a requested entity until it
//! reaches the default, producing an [`AncestorChain`].
//!
//! The chain is kept in discovery order (immediate parent first, most distant
//! ancestor last). The merge step consumes it in reverse, so the most distant
//! ancestor is applied first and the immediate parent last.
//!
//! Unlike a bare walk, this resolver refuses to loop forever: revisiting an
//! entity is reported as `CyclicInheritance`, and a chain longer than the
//! configured maximum as `InheritanceTooDeep`.

use std::collections::HashSet;
use tracing::debug;

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::key::{DocumentKey, EntityRef, KEY_SEPARATOR};
use crate::registry::{EntityTypeRegistry, InheritContext, InheritTarget};

#[cfg(test)]
#[path = "inheritance_tests.rs"]
mod tests;

/// Ordered ancestors of one entity, immediate parent first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AncestorChain {
    links: Vec<EntityRef>,
}

impl AncestorChain {
    /// Builds a chain from ancestors in discovery order.
    pub fn new(links: Vec<EntityRef>) -> Self {
        Self { links }
    }

    /// Ancestors in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRef> {
        self.links.iter()
    }

    /// Ancestors in merge order, most distant first.
    pub fn root_first(&self) -> impl Iterator<Item = &EntityRef> {
        self.links.iter().rev()
    }

    /// Document keys of every ancestor, in discovery order.
    pub fn keys(&self) -> impl Iterator<Item = DocumentKey> + '_ {
        self.links.iter().map(EntityRef::key)
    }

    /// Number of ancestors.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the entity inherits straight from the default.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Resolves ancestor chains against an entity type registry.
#[derive(Debug, Clone)]
pub struct InheritanceResolver<'a> {
    registry: &'a EntityTypeRegistry,
    max_depth: usize,
}

impl<'a> InheritanceResolver<'a> {
    /// Creates a resolver that gives up after `max_depth` ancestors.
    pub fn new(registry: &'a EntityTypeRegistry, max_depth: usize) -> Self {
        Self {
            registry,
            max_depth,
        }
    }

    /// Resolves the ancestor chain of `entity`.
    ///
    /// # Errors
    ///
    /// - `MalformedInheritResult` when an inherit function rejects its own
    ///   result, or names an entity with an empty type or id, or an id
    ///   containing the key separator
    /// - any other error an inherit function returns
    /// - `CyclicInheritance` when the walk revisits an entity
    /// - `InheritanceTooDeep` when the chain exceeds the maximum depth
    pub fn resolve(
        &self,
        entity: &EntityRef,
        context: &InheritContext,
    ) -> ConfigurationResult<AncestorChain> {
        let mut links: Vec<EntityRef> = Vec::new();
        let mut visited: HashSet<EntityRef> = HashSet::new();
        visited.insert(entity.clone());

        let mut current = entity.clone();
        loop {
            let next = match self.registry.inherit_target(&current, context)? {
                InheritTarget::Default => break,
                InheritTarget::Entity(next) => next,
            };

            check_link(&current, &next)?;

            if !visited.insert(next.clone()) {
                let mut chain: Vec<String> = links.iter().map(|link| link.to_string()).collect();
                chain.push(next.to_string());
                return Err(ConfigurationError::CyclicInheritance {
                    entity_type: entity.entity_type().to_string(),
                    entity_id: entity.entity_id().to_string(),
                    chain,
                });
            }

            if links.len() >= self.max_depth {
                return Err(ConfigurationError::InheritanceTooDeep {
                    entity_type: entity.entity_type().to_string(),
                    entity_id: entity.entity_id().to_string(),
                    max_depth: self.max_depth,
                });
            }

            links.push(next.clone());
            current = next;
        }

        debug!(entity = %entity, ancestors = links.len(), "Resolved inheritance chain");
        Ok(AncestorChain::new(links))
    }
}

/// Rejects inherit results that cannot name a stored document.
fn check_link(from: &EntityRef, next: &EntityRef) -> ConfigurationResult<()> {
    let reason = if next.entity_type().is_empty() {
        Some("inherited entity type is empty".to_string())
    } else if next.entity_id().is_empty() {
        Some("inherited entity id is empty".to_string())
    } else if next.entity_id().contains(KEY_SEPARATOR) {
        Some(format!(
            "inherited entity id '{}' contains the key separator",
            next.entity_id()
        ))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigurationError::MalformedInheritResult {
            entity_type: from.entity_type().to_string(),
            entity_id: from.entity_id().to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
