//! Keychain access for secure credential storage.
//!
//! Wraps the keyring crate to provide OS-native credential storage for
//! mailbox access tokens and AI provider API keys.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Credential, UserId};
use crate::services::{CredentialError, CredentialStore};

/// Errors that can occur during keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn blocking task: {0}")]
    TaskFailed(String),
}

/// Result type for keychain operations.
pub type Result<T> = std::result::Result<T, KeychainError>;

/// Provides access to the OS keychain for credential storage.
///
/// Entries are namespaced by the service name, keyed per user or provider.
#[derive(Debug, Clone)]
pub struct KeychainAccess {
    service_name: String,
}

impl KeychainAccess {
    /// Default service name for sortbox credentials.
    pub const DEFAULT_SERVICE: &'static str = "sortbox";

    /// Creates a new KeychainAccess with the default service name.
    pub fn new() -> Self {
        Self {
            service_name: Self::DEFAULT_SERVICE.to_string(),
        }
    }

    /// Creates a new KeychainAccess with a custom service name.
    ///
    /// Useful for testing to avoid interfering with real credentials.
    pub fn with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service_name, key)?)
    }

    fn get_blocking(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeychainError::Keyring(e)),
        }
    }

    /// Stores a credential, overwriting any previous value.
    pub async fn store(&self, key: &str, value: &str) -> Result<()> {
        let this = self.clone();
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            this.entry(&key)?.set_password(&value)?;
            Ok(())
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    /// Retrieves a credential; `None` if no entry exists.
    pub async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        let this = self.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || this.get_blocking(&key))
            .await
            .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    /// Deletes a credential.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let this = self.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || match this.entry(&key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Err(KeychainError::NotFound(key)),
            Err(e) => Err(KeychainError::Keyring(e)),
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    /// Returns the service name used for this keychain access.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Keychain key for a user's mailbox OAuth access token.
    pub fn oauth_access_token_key(user_id: &str) -> String {
        format!("oauth.access_token.{}", user_id)
    }

    /// Keychain key for an AI provider's API key.
    pub fn ai_api_key(provider: &str) -> String {
        format!("ai.api_key.{}", provider)
    }
}

impl Default for KeychainAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeychainAccess {
    async fn mailbox_credential(
        &self,
        user_id: &UserId,
    ) -> std::result::Result<Option<Credential>, CredentialError> {
        self.retrieve(&Self::oauth_access_token_key(&user_id.0))
            .await
            .map(|token| token.map(Credential::new))
            .map_err(|e| CredentialError(e.to_string()))
    }
}
