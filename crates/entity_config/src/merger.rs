//! Configuration merging engine.
//!
//! Folds a sequence of partial configuration documents into one effective
//! configuration. Later layers take precedence field by field:
//!
//! 1. **Default** - the global default document (lowest precedence)
//! 2. **Ancestors** - most distant ancestor first, immediate parent last
//! 3. **Own** - the entity's own document (highest precedence)
//!
//! Nested objects are merged recursively so sibling fields survive. Every
//! other value, lists included, replaces the base value wholesale.
//!
//! # Examples
//!
//! ```rust
//! use entity_config::ConfigurationMerger;
//! use serde_json::json;
//!
//! let default = json!({ "theme": "light", "size": 10 });
//! let ancestor = json!({ "theme": "dark" });
//! let own = json!({ "size": 20 });
//!
//! let merger = ConfigurationMerger::new();
//! let merged = merger.merge_layers([
//!     default.as_object(),
//!     ancestor.as_object(),
//!     own.as_object(),
//! ].into_iter().flatten());
//!
//! assert_eq!(serde_json::Value::Object(merged), json!({ "theme": "dark", "size": 20 }));
//! ```

use serde_json::Value;

use crate::document::ConfigMap;

#[cfg(test)]
#[path = "merger_tests.rs"]
mod tests;

/// Configuration merging engine.
///
/// This is a stateless component: it takes configuration layers and produces
/// merged output without holding on to either.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationMerger {}

impl ConfigurationMerger {
    /// Creates a new configuration merger.
    pub fn new() -> Self {
        Self {}
    }

    /// Merges `layers` in resolution order, root first.
    ///
    /// Merging is associative in application order but not commutative.
    pub fn merge_layers<'a, I>(&self, layers: I) -> ConfigMap
    where
        I: IntoIterator<Item = &'a ConfigMap>,
    {
        let mut merged = ConfigMap::new();
        for layer in layers {
            self.deep_merge(&mut merged, layer);
        }
        merged
    }

    /// Overlays `overlay` onto `base` in place.
    ///
    /// Every field present in `overlay` overwrites the same field in `base`,
    /// recursing when both sides hold an object.
    pub fn deep_merge(&self, base: &mut ConfigMap, overlay: &ConfigMap) {
        for (key, overlay_value) in overlay {
            match (base.get_mut(key), overlay_value) {
                (Some(Value::Object(base_fields)), Value::Object(overlay_fields)) => {
                    self.deep_merge(base_fields, overlay_fields);
                }
                _ => {
                    base.insert(key.clone(), overlay_value.clone());
                }
            }
        }
    }
}
