//! Entity configuration error types.
//!
//! Domain-specific errors for registering entity types, resolving
//! inheritance chains, validating writes and talking to the document store.

use thiserror::Error;

use crate::validator::ValidationError;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Entity configuration errors.
///
/// Every error is surfaced synchronously to the immediate caller. Store-layer
/// failures are carried through unchanged; nothing at this layer retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Entity type is not registered: {entity_type}")]
    UnregisteredType { entity_type: String },

    #[error("Invalid entity type: {reason}")]
    InvalidEntityType { reason: String },

    #[error("Invalid entity reference {entity_type}/{entity_id}: {reason}")]
    InvalidEntityReference {
        entity_type: String,
        entity_id: String,
        reason: String,
    },

    #[error("Invalid default prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    #[error("Inherit function for {entity_type}/{entity_id} returned a malformed result: {reason}")]
    MalformedInheritResult {
        entity_type: String,
        entity_id: String,
        reason: String,
    },

    #[error("Inheritance cycle detected while resolving {entity_type}/{entity_id}: {chain:?}")]
    CyclicInheritance {
        entity_type: String,
        entity_id: String,
        chain: Vec<String>,
    },

    #[error("Inheritance chain for {entity_type}/{entity_id} exceeds the maximum depth of {max_depth}")]
    InheritanceTooDeep {
        entity_type: String,
        entity_id: String,
        max_depth: usize,
    },

    #[error("Access denied for user {user_id:?} on {entity_type}/{entity_id}")]
    AccessDenied {
        user_id: Option<String>,
        entity_type: String,
        entity_id: String,
    },

    #[error("Configuration validation failed for entity type '{entity_type}' with {error_count} error(s)")]
    ValidationFailed {
        entity_type: String,
        error_count: usize,
        errors: Vec<ValidationError>,
    },

    #[error("Configuration schema could not be compiled: {reason}")]
    SchemaCompilation { reason: String },

    #[error("Document already exists: {key}")]
    StoreConflict { key: String },

    #[error("Document store operation failed: {reason}")]
    StoreFailure { reason: String },

    #[error("Acting user could not be determined: {reason}")]
    IdentityUnavailable { reason: String },

    #[error("Failed to load engine settings from {path}: {reason}")]
    SettingsLoad { path: String, reason: String },
}

/// Result type alias for entity configuration operations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
