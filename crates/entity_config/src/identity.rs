//! Acting-user lookup.
//!
//! The write path asks an [`IdentityProvider`] who is performing a write so
//! the after-update event can name them. The lookup is best effort: an error
//! is logged and the event carries no user.

use async_trait::async_trait;

use crate::errors::ConfigurationResult;

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

/// Source of the acting user's id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current user's id, `None` when there is no authenticated user.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::IdentityUnavailable` when the identity
    /// mechanism cannot be consulted at all.
    async fn current_user_id(&self) -> ConfigurationResult<Option<String>>;
}

/// Identity for code running outside any user context.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn current_user_id(&self) -> ConfigurationResult<Option<String>> {
        Ok(None)
    }
}

/// Identity fixed to a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity {
    user_id: String,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user_id(&self) -> ConfigurationResult<Option<String>> {
        Ok(Some(self.user_id.clone()))
    }
}
