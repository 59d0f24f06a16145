//! Wiring from [`Config`] to a ready lifecycle manager and playback client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cleanplayer_common::auth::{OAuthClient, OAuthConfig};
use cleanplayer_core::{CredentialLifecycleManager, CredentialRepository, LocalStore};
use cleanplayer_domain::{
    CleanPlayerError, Config, CredentialRecord, Result, SpotifyConfig, StoreBackend, StoreConfig,
};
use tracing::{info, warn};

use crate::http::HttpClient;
use crate::identity::SpotifyProfileClient;
use crate::player::PlayerClient;
use crate::storage::{KeychainLocalStore, RestCredentialRepository, SqliteCredentialRepository};

/// Everything the application needs from the auth layer
#[derive(Clone)]
pub struct CleanPlayerServices {
    pub manager: Arc<CredentialLifecycleManager>,
    pub player: PlayerClient,
}

/// Build services with the keychain as the device-local store.
///
/// # Errors
/// Returns `CleanPlayerError::Config` for an invalid configuration and
/// `CleanPlayerError::Storage` if the SQLite store cannot be opened.
pub fn build_services(config: &Config) -> Result<CleanPlayerServices> {
    let local = Arc::new(KeychainLocalStore::new(&config.session.keychain_service));
    build_services_with(config, local)
}

/// Build services over a caller-supplied local store.
///
/// # Errors
/// See [`build_services`].
pub fn build_services_with(
    config: &Config,
    local: Arc<dyn LocalStore>,
) -> Result<CleanPlayerServices> {
    config.validate()?;

    let http = HttpClient::new()?;
    let exchanger = Arc::new(OAuthClient::new(oauth_config(&config.spotify)));
    let identity = Arc::new(SpotifyProfileClient::new(http.clone(), &config.spotify.api_base_url));
    let remote = build_remote_store(&config.store)?;

    let manager = Arc::new(
        CredentialLifecycleManager::new(exchanger, identity, local, remote)
            .with_verifier_length(config.session.verifier_length)
            .with_reset_delay(Duration::from_millis(config.session.session_reset_delay_ms)),
    );
    let player = PlayerClient::new(http, &config.spotify.api_base_url, manager.clone());

    info!(backend = ?config.store.backend, "Auth services ready");
    Ok(CleanPlayerServices { manager, player })
}

#[must_use]
pub fn oauth_config(spotify: &SpotifyConfig) -> OAuthConfig {
    OAuthConfig::new(
        spotify.accounts_base_url.clone(),
        spotify.client_id.clone(),
        spotify.redirect_uri.clone(),
        spotify.scopes.clone(),
    )
}

/// Select the remote credential store.
///
/// A REST backend without a URL or key yields a store that fails every
/// call, so token operations fail closed instead of the process refusing
/// to start.
///
/// # Errors
/// Returns an error if the configured store cannot be constructed.
pub fn build_remote_store(store: &StoreConfig) -> Result<Arc<dyn CredentialRepository>> {
    match store.backend {
        StoreBackend::Sqlite => {
            let repo = SqliteCredentialRepository::open(&store.sqlite_path, &store.table)?;
            Ok(Arc::new(repo))
        }
        StoreBackend::Rest => match (&store.rest_url, &store.rest_api_key) {
            (Some(url), Some(key)) => {
                Ok(Arc::new(RestCredentialRepository::new(url, key, &store.table)?))
            }
            _ => {
                warn!("REST credential store has no URL or API key; remote operations will fail");
                Ok(Arc::new(UnconfiguredStore))
            }
        },
    }
}

#[derive(Debug)]
struct UnconfiguredStore;

impl UnconfiguredStore {
    fn error<T>() -> Result<T> {
        Err(CleanPlayerError::Storage("remote credential store is not configured".to_string()))
    }
}

#[async_trait]
impl CredentialRepository for UnconfiguredStore {
    async fn upsert(&self, _record: &CredentialRecord) -> Result<()> {
        Self::error()
    }

    async fn get(&self, _user_id: &str) -> Result<Option<CredentialRecord>> {
        Self::error()
    }

    async fn delete(&self, _user_id: &str) -> Result<()> {
        Self::error()
    }

    async fn list_all(&self) -> Result<Vec<CredentialRecord>> {
        Self::error()
    }
}
