//! Port interfaces for credential storage and identity
//!
//! These traits define the boundaries between the lifecycle manager and
//! infrastructure implementations.

use async_trait::async_trait;
use cleanplayer_domain::{CredentialRecord, Result};

/// Per-device string key/value store
///
/// Holds the PKCE verifier during the authorization round trip, raw tokens
/// awaiting migration, and the last known user id pointer.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Shared credential store keyed by provider user id
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Insert or replace the record for `record.user_id`
    async fn upsert(&self, record: &CredentialRecord) -> Result<()>;

    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>>;

    async fn delete(&self, user_id: &str) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<CredentialRecord>>;
}

/// Resolves the provider's canonical user id from an access token
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_user_id(&self, access_token: &str) -> Result<String>;
}

/// Trait for providing access tokens
///
/// The single call downstream consumers make. `None` means the session
/// needs a fresh login; details were already reported as session events.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}
