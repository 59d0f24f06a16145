//! Device-local store in the platform keychain
//!
//! Each key becomes one keychain entry under a shared service name
//! (macOS Keychain, Windows Credential Manager, Secret Service on Linux).
//! Keyring calls block, so they run on the blocking pool.

use async_trait::async_trait;
use cleanplayer_core::LocalStore;
use cleanplayer_domain::{CleanPlayerError, Result};
use keyring::{Entry, Error as KeyringError};
use tracing::debug;

use crate::errors::InfraError;

/// `LocalStore` backed by the OS keychain
#[derive(Debug, Clone)]
pub struct KeychainLocalStore {
    service: String,
}

impl KeychainLocalStore {
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> std::result::Result<T, KeyringError> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key).map_err(InfraError::from)?;
            op(entry).map_err(|e| CleanPlayerError::from(InfraError::from(e)))
        })
        .await
        .map_err(|e| CleanPlayerError::Internal(format!("keychain task failed: {e}")))?
    }
}

#[async_trait]
impl LocalStore for KeychainLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        debug!(service = %self.service, key, "Reading keychain entry");
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        debug!(service = %self.service, key, "Writing keychain entry");
        let value = value.to_string();
        self.with_entry(key, move |entry| entry.set_password(&value)).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        debug!(service = %self.service, key, "Deleting keychain entry");
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}
