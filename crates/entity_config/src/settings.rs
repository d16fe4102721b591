//! Engine settings.
//!
//! Tunables for resolution and write normalization, loaded from TOML.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! max_inheritance_depth = 32
//! remove_empty_strings = false
//! warn_on_cache_miss = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::errors::{ConfigurationError, ConfigurationResult};

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Default upper bound on the length of an ancestor chain.
pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 64;

/// Tunables shared by the resolver and the write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Longest ancestor chain accepted before resolution fails.
    pub max_inheritance_depth: usize,

    /// Treat empty-string leaves in partial writes as "unset".
    pub remove_empty_strings: bool,

    /// Log a warning when a bulk resolution has to fall back to the store.
    pub warn_on_cache_miss: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_inheritance_depth: DEFAULT_MAX_INHERITANCE_DEPTH,
            remove_empty_strings: true,
            warn_on_cache_miss: true,
        }
    }
}

impl EngineSettings {
    /// Parses settings from a TOML string; omitted keys take their defaults.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use entity_config::EngineSettings;
    ///
    /// let settings = EngineSettings::from_toml_str("remove_empty_strings = false")?;
    /// assert!(!settings.remove_empty_strings);
    /// assert_eq!(settings.max_inheritance_depth, 64);
    /// # Ok::<(), entity_config::ConfigurationError>(())
    /// ```
    pub fn from_toml_str(content: &str) -> ConfigurationResult<Self> {
        toml::from_str(content).map_err(|e| ConfigurationError::SettingsLoad {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::SettingsLoad` if the file does not exist,
    /// cannot be read, or does not parse.
    pub fn load(path: &Path) -> ConfigurationResult<Self> {
        debug!("Loading engine settings from {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| ConfigurationError::SettingsLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigurationError::SettingsLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
