//! Credential lifecycle manager
//!
//! Sole owner of the transitions between `LocalOnly`, `Migrating` and
//! `RemoteResident`. Everything else in the application asks for "a usable
//! token" and never touches the stores directly.
//!
//! Concurrency:
//! - identity resolution and migration run behind one session-wide gate, so
//!   concurrent first calls coalesce into a single migration
//! - refreshes are serialized per user id; callers that waited on an
//!   in-flight refresh share its outcome, success or failure

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cleanplayer_common::auth::{PKCEChallenge, TokenExchanger};
use cleanplayer_domain::constants::{
    DEFAULT_SESSION_RESET_DELAY_MS, DEFAULT_VERIFIER_LENGTH, LOCAL_KEY_ACCESS_TOKEN,
    LOCAL_KEY_EXPIRY_TIME, LOCAL_KEY_REFRESH_TOKEN, LOCAL_KEY_TOKEN_GENERATION_TIME,
    LOCAL_KEY_USER_ID, LOCAL_KEY_VERIFIER, LOCAL_TOKEN_KEYS, LOGOUT_KEYS,
};
use cleanplayer_domain::{CredentialRecord, LocalCredentials};
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use super::errors::AuthError;
use super::events::AuthEvent;
use super::ports::{AccessTokenProvider, CredentialRepository, IdentityResolver, LocalStore};
use super::session::{SessionContext, SessionState};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Per-user refresh serialization
///
/// `completed` counts finished refresh attempts. A caller that saw a lower
/// count before taking the lock waited on someone else's attempt and reuses
/// its outcome instead of calling the token endpoint again.
#[derive(Default)]
struct RefreshSlot {
    completed: AtomicU64,
    last_failure: Mutex<Option<AuthError>>,
}

/// Orchestrates PKCE login, code exchange, migration and refresh-before-use
pub struct CredentialLifecycleManager {
    exchanger: Arc<dyn TokenExchanger>,
    identity: Arc<dyn IdentityResolver>,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn CredentialRepository>,
    context: RwLock<SessionContext>,
    migration_gate: Mutex<()>,
    refresh_slots: parking_lot::Mutex<HashMap<String, Arc<RefreshSlot>>>,
    events: broadcast::Sender<AuthEvent>,
    verifier_length: usize,
    reset_delay: Duration,
}

impl CredentialLifecycleManager {
    /// Create a manager with a fresh session context
    pub fn new(
        exchanger: Arc<dyn TokenExchanger>,
        identity: Arc<dyn IdentityResolver>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn CredentialRepository>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            exchanger,
            identity,
            local,
            remote,
            context: RwLock::new(SessionContext::new()),
            migration_gate: Mutex::new(()),
            refresh_slots: parking_lot::Mutex::new(HashMap::new()),
            events,
            verifier_length: DEFAULT_VERIFIER_LENGTH,
            reset_delay: Duration::from_millis(DEFAULT_SESSION_RESET_DELAY_MS),
        }
    }

    /// Start from an existing session context (e.g. a known user id)
    #[must_use]
    pub fn with_session(self, context: SessionContext) -> Self {
        *self.context.write() = context;
        self
    }

    /// Override the PKCE verifier length (43..=128)
    #[must_use]
    pub fn with_verifier_length(mut self, length: usize) -> Self {
        self.verifier_length = length;
        self
    }

    /// Delay between `LoggedOut` and `SessionReset`
    #[must_use]
    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.context.read().state
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.context.read().user_id.clone()
    }

    // ------------------------------------------------------------------
    // Session boundary operations
    // ------------------------------------------------------------------

    /// Begin an authorization round trip.
    ///
    /// Returns the authorize URL the user agent must be sent to, or `None`
    /// after reporting the failure.
    pub async fn login(&self) -> Option<String> {
        self.try_login().await.map_err(|e| self.report(&e)).ok()
    }

    /// # Errors
    /// `Pkce` if the verifier cannot be generated, `StoreUnavailable` if it
    /// cannot be persisted.
    pub async fn try_login(&self) -> Result<String, AuthError> {
        self.set_state(SessionState::Authorizing);

        let pkce = PKCEChallenge::generate(self.verifier_length).map_err(|e| {
            self.set_state(SessionState::Failed);
            AuthError::Pkce(e.to_string())
        })?;

        self.local.set(LOCAL_KEY_VERIFIER, &pkce.code_verifier).await.map_err(|e| {
            self.set_state(SessionState::Failed);
            AuthError::store(&e)
        })?;

        let url = self.exchanger.authorization_url(&pkce);
        info!(redirect_uri = %self.exchanger.redirect_uri(), "Authorization started");
        self.emit(AuthEvent::LoginStarted);
        Ok(url)
    }

    /// Handle the provider redirect carrying `code`.
    ///
    /// Returns `true` once tokens were obtained, whether they reached the
    /// remote store or were parked locally for a later migration.
    pub async fn complete_login(&self, code: &str) -> bool {
        match self.try_complete_login(code).await {
            Ok(_) => true,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// # Errors
    /// `TokenExchange`/`RedirectMismatch` if the provider rejects the code.
    /// Identity or store failures after a successful exchange are not errors:
    /// the tokens are parked locally and `LocalOnly` is returned.
    pub async fn try_complete_login(&self, code: &str) -> Result<SessionState, AuthError> {
        self.set_state(SessionState::Exchanging);

        let verifier = self
            .local
            .get(LOCAL_KEY_VERIFIER)
            .await
            .map_err(|e| AuthError::store(&e))?
            .filter(|v| !v.is_empty());

        let Some(verifier) = verifier else {
            self.set_state(SessionState::Failed);
            return Err(AuthError::TokenExchange {
                status: None,
                message: "no pending authorization (verifier missing)".to_string(),
            });
        };

        let exchanged = self.exchanger.exchange_code(code, &verifier).await;

        // Single use, success or failure.
        if let Err(e) = self.local.remove(LOCAL_KEY_VERIFIER).await {
            warn!(error = %e, "Failed to clear PKCE verifier");
        }

        let grant = exchanged.map_err(|e| {
            self.set_state(SessionState::Failed);
            AuthError::from_exchange(&e)
        })?;

        let Some(refresh_token) = grant.refresh_token.filter(|t| !t.is_empty()) else {
            self.set_state(SessionState::Failed);
            return Err(AuthError::TokenExchange {
                status: None,
                message: "provider issued no refresh token".to_string(),
            });
        };

        let issued_at = Utc::now();
        let local = LocalCredentials {
            access_token: grant.access_token,
            refresh_token,
            lifetime_seconds: Some(grant.expires_in),
            generated_at: Some(issued_at),
        };

        let user_id = match self.identity.resolve_user_id(&local.access_token).await {
            Ok(user_id) => user_id,
            Err(e) => {
                warn!(error = %e, "Identity resolution failed after login; keeping tokens locally");
                return self.park_locally(&local).await;
            }
        };

        let record = local.clone().into_record(&user_id);
        if let Err(e) = self.remote.upsert(&record).await {
            warn!(user_id = %user_id, error = %e, "Remote store write failed after login");
            return self.park_locally(&local).await;
        }

        self.remember_user(&user_id).await;
        self.set_state(SessionState::RemoteResident);
        info!(user_id = %user_id, "Logged in");
        self.emit(AuthEvent::LoggedIn { user_id });
        Ok(SessionState::RemoteResident)
    }

    /// Clear device-local auth state and the resolved identity.
    ///
    /// The remote record is kept, so the next session reuses it without a
    /// new consent. The `spotifyUserId` pointer survives for the same reason.
    /// `SessionReset` follows `LoggedOut` after the configured delay.
    pub async fn log_out(&self) {
        for key in LOGOUT_KEYS {
            if let Err(e) = self.local.remove(key).await {
                warn!(key, error = %e, "Failed to clear local auth key");
            }
        }

        {
            let mut context = self.context.write();
            context.user_id = None;
            context.state = SessionState::NoCredential;
        }

        info!("Logged out");
        self.emit(AuthEvent::LoggedOut);

        let events = self.events.clone();
        let delay = self.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(AuthEvent::SessionReset);
        });
    }

    // ------------------------------------------------------------------
    // Token request path
    // ------------------------------------------------------------------

    /// Return a usable access token, refreshing or migrating as needed.
    ///
    /// `None` means the caller must start a new login; the reason was
    /// already logged and broadcast.
    pub async fn get_usable_token(&self) -> Option<String> {
        self.try_get_usable_token().await.map_err(|e| self.report(&e)).ok()
    }

    /// # Errors
    /// - `LoginRequired` when no identity or no remote record exists
    /// - `IdentityResolution` when local tokens cannot be tied to a user
    /// - `StoreUnavailable` when a store cannot be read or written
    /// - `Refresh` when the provider rejects the refresh token
    pub async fn try_get_usable_token(&self) -> Result<String, AuthError> {
        let Some(user_id) = self.resolve_session_user().await? else {
            self.set_state(SessionState::NoCredential);
            return Err(AuthError::LoginRequired);
        };

        let slot = self.refresh_slot(&user_id);
        let observed = slot.completed.load(Ordering::Acquire);

        let record = self.load_record(&user_id).await?;
        if record.is_usable_at(Utc::now()) {
            self.set_state(SessionState::RemoteResident);
            return Ok(record.access_token);
        }

        self.refresh_remote(&user_id, &slot, observed).await
    }

    /// Steps 1-3: in-memory id, then local tokens (migrated), then the local
    /// user id pointer.
    async fn resolve_session_user(&self) -> Result<Option<String>, AuthError> {
        if let Some(user_id) = self.current_user_id() {
            return Ok(Some(user_id));
        }

        let _gate = self.migration_gate.lock().await;
        if let Some(user_id) = self.current_user_id() {
            debug!("Identity resolved by a concurrent caller");
            return Ok(Some(user_id));
        }

        if let Some(local) = self.read_local_credentials().await? {
            return self.migrate(local).await.map(Some);
        }

        let pointer = self
            .local
            .get(LOCAL_KEY_USER_ID)
            .await
            .map_err(|e| AuthError::store(&e))?
            .filter(|id| !id.is_empty());

        if let Some(user_id) = &pointer {
            debug!(user_id = %user_id, "Resuming session from last known user id");
            self.context.write().user_id = Some(user_id.clone());
        }
        Ok(pointer)
    }

    async fn read_local_credentials(&self) -> Result<Option<LocalCredentials>, AuthError> {
        let access = self.local_value(LOCAL_KEY_ACCESS_TOKEN).await?;
        let refresh = self.local_value(LOCAL_KEY_REFRESH_TOKEN).await?;
        if access.is_none() || refresh.is_none() {
            return Ok(None);
        }

        let expiry = self.local_value(LOCAL_KEY_EXPIRY_TIME).await?;
        let generated = self.local_value(LOCAL_KEY_TOKEN_GENERATION_TIME).await?;
        Ok(LocalCredentials::from_raw(access, refresh, expiry.as_deref(), generated.as_deref()))
    }

    async fn local_value(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.local.get(key).await.map_err(|e| AuthError::store(&e))
    }

    /// Move local tokens to the remote store under their owner's user id.
    ///
    /// Local data is only cleared after the remote write succeeded. A token
    /// that failed identity resolution is never handed out.
    async fn migrate(&self, local: LocalCredentials) -> Result<String, AuthError> {
        self.set_state(SessionState::LocalOnly);

        let (local, user_id) = match self.identity.resolve_user_id(&local.access_token).await {
            Ok(user_id) => (local, user_id),
            Err(e) if local.is_usable_at(Utc::now()) => {
                warn!(error = %e, "Local token rejected by profile endpoint; keeping it for later");
                return Err(AuthError::identity(&e));
            }
            Err(e) => {
                debug!(error = %e, "Local token stale; refreshing before migration");
                let refreshed = self.refresh_local(local).await?;
                let user_id =
                    self.identity.resolve_user_id(&refreshed.access_token).await.map_err(|e| {
                        warn!(error = %e, "Refreshed local token rejected by profile endpoint");
                        AuthError::identity(&e)
                    })?;
                (refreshed, user_id)
            }
        };

        self.set_state(SessionState::Migrating);
        let record = local.into_record(&user_id);
        if let Err(e) = self.remote.upsert(&record).await {
            self.set_state(SessionState::LocalOnly);
            warn!(user_id = %user_id, error = %e, "Migration write failed; local tokens kept");
            return Err(AuthError::store(&e));
        }

        for key in LOCAL_TOKEN_KEYS {
            if let Err(e) = self.local.remove(key).await {
                warn!(key, error = %e, "Failed to clear migrated local token key");
            }
        }
        self.remember_user(&user_id).await;

        info!(user_id = %user_id, "Migrated local credentials to remote store");
        self.emit(AuthEvent::CredentialsMigrated { user_id: user_id.clone() });
        Ok(user_id)
    }

    /// Refresh a stale local snapshot in place (pre-migration fallback).
    async fn refresh_local(&self, local: LocalCredentials) -> Result<LocalCredentials, AuthError> {
        let grant = self.exchanger.refresh(&local.refresh_token).await.map_err(|e| {
            self.set_state(SessionState::Failed);
            AuthError::from_refresh(&e)
        })?;

        let refreshed = LocalCredentials {
            access_token: grant.access_token,
            refresh_token: grant
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or(local.refresh_token),
            lifetime_seconds: Some(grant.expires_in),
            generated_at: Some(Utc::now()),
        };
        self.write_local(&refreshed).await?;
        Ok(refreshed)
    }

    async fn write_local(&self, local: &LocalCredentials) -> Result<(), AuthError> {
        let lifetime = local.lifetime_seconds.unwrap_or(0);
        let generated_at = local.generated_at.unwrap_or_else(Utc::now);
        let entries = [
            (LOCAL_KEY_ACCESS_TOKEN, local.access_token.clone()),
            (LOCAL_KEY_REFRESH_TOKEN, local.refresh_token.clone()),
            (LOCAL_KEY_EXPIRY_TIME, LocalCredentials::expiry_time_value(lifetime)),
            (
                LOCAL_KEY_TOKEN_GENERATION_TIME,
                LocalCredentials::generation_time_value(generated_at),
            ),
        ];
        for (key, value) in entries {
            self.local.set(key, &value).await.map_err(|e| AuthError::store(&e))?;
        }
        Ok(())
    }

    /// Keep fresh tokens on the device until they can be migrated.
    ///
    /// The cached identity is dropped so the next token request takes the
    /// migration path instead of reading an older remote record.
    async fn park_locally(&self, local: &LocalCredentials) -> Result<SessionState, AuthError> {
        self.write_local(local).await?;
        let mut context = self.context.write();
        context.user_id = None;
        context.state = SessionState::LocalOnly;
        Ok(SessionState::LocalOnly)
    }

    async fn load_record(&self, user_id: &str) -> Result<CredentialRecord, AuthError> {
        let record = self.remote.get(user_id).await.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Remote store read failed");
            AuthError::store(&e)
        })?;

        match record {
            Some(record) if !record.is_absent() => Ok(record),
            _ => {
                debug!(user_id = %user_id, "No remote credential for user");
                self.set_state(SessionState::NoCredential);
                Err(AuthError::LoginRequired)
            }
        }
    }

    /// Refresh under the per-user lock.
    ///
    /// `observed` is the slot's attempt count read before the caller saw the
    /// stale record. If an attempt finished since then, its outcome is
    /// shared: a failure is returned as-is and a success is read back from
    /// the remote store.
    async fn refresh_remote(
        &self,
        user_id: &str,
        slot: &RefreshSlot,
        observed: u64,
    ) -> Result<String, AuthError> {
        let mut last_failure = slot.last_failure.lock().await;

        if slot.completed.load(Ordering::Acquire) != observed {
            if let Some(err) = last_failure.as_ref() {
                debug!(user_id = %user_id, "Concurrent refresh failed; sharing its result");
                self.set_state(SessionState::Failed);
                return Err(err.clone());
            }
        }

        let current = self.load_record(user_id).await?;
        if current.is_usable_at(Utc::now()) {
            debug!(user_id = %user_id, "Token refreshed by a concurrent caller");
            self.set_state(SessionState::RemoteResident);
            return Ok(current.access_token);
        }

        let outcome = self.refresh_record(user_id, current).await;
        *last_failure = outcome.as_ref().err().cloned();
        slot.completed.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn refresh_record(
        &self,
        user_id: &str,
        current: CredentialRecord,
    ) -> Result<String, AuthError> {
        self.set_state(SessionState::Refreshing);
        let grant = match self.exchanger.refresh(&current.refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                self.set_state(SessionState::Failed);
                warn!(user_id = %user_id, status = ?e.status(), "Refresh rejected");
                return Err(AuthError::from_refresh(&e));
            }
        };

        let updated =
            current.refreshed(grant.access_token, grant.refresh_token, grant.expires_in, Utc::now());
        self.remote.upsert(&updated).await.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Failed to persist refreshed token");
            AuthError::store(&e)
        })?;

        self.set_state(SessionState::RemoteResident);
        info!(user_id = %user_id, "Access token refreshed");
        self.emit(AuthEvent::TokenRefreshed { user_id: user_id.to_string() });
        Ok(updated.access_token)
    }

    fn refresh_slot(&self, user_id: &str) -> Arc<RefreshSlot> {
        let mut slots = self.refresh_slots.lock();
        slots.entry(user_id.to_string()).or_default().clone()
    }

    async fn remember_user(&self, user_id: &str) {
        if let Err(e) = self.local.set(LOCAL_KEY_USER_ID, user_id).await {
            warn!(error = %e, "Failed to persist last known user id");
        }
        self.context.write().user_id = Some(user_id.to_string());
    }

    fn set_state(&self, state: SessionState) {
        let mut context = self.context.write();
        if context.state != state {
            debug!(from = %context.state, to = %state, "Session state transition");
            context.state = state;
        }
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn report(&self, err: &AuthError) {
        match err {
            AuthError::RedirectMismatch(_) => {
                error!(error = %err, "Redirect URI mismatch; fix the registered redirect URI");
            }
            AuthError::LoginRequired => debug!("Login required"),
            other if other.is_terminal() => {
                warn!(kind = other.kind(), error = %other, "Authentication failure; login required");
            }
            other => {
                info!(
                    kind = other.kind(),
                    error = %other,
                    "Token unavailable; will retry on next request"
                );
            }
        }
        self.emit(AuthEvent::from_error(err));
    }
}

#[async_trait]
impl AccessTokenProvider for CredentialLifecycleManager {
    async fn access_token(&self) -> Option<String> {
        self.get_usable_token().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use cleanplayer_common::auth::TokenGrant;
    use cleanplayer_common::testing::MockOAuthClient;

    use super::*;
    use crate::auth::memory::{
        InMemoryCredentialRepository, InMemoryLocalStore, StaticIdentityResolver,
    };

    struct Harness {
        exchanger: MockOAuthClient,
        identity: StaticIdentityResolver,
        local: InMemoryLocalStore,
        remote: InMemoryCredentialRepository,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                exchanger: MockOAuthClient::new(),
                identity: StaticIdentityResolver::new()
                    .with_token("mock_access_token", "user-1")
                    .with_token("A", "user-1")
                    .with_token("refreshed_access_token", "user-1"),
                local: InMemoryLocalStore::new(),
                remote: InMemoryCredentialRepository::new(),
            }
        }

        fn manager(&self) -> CredentialLifecycleManager {
            CredentialLifecycleManager::new(
                Arc::new(self.exchanger.clone()),
                Arc::new(self.identity.clone()),
                Arc::new(self.local.clone()),
                Arc::new(self.remote.clone()),
            )
            .with_reset_delay(std::time::Duration::from_millis(10))
        }
    }

    #[tokio::test]
    async fn login_persists_verifier_and_returns_authorize_url() {
        let h = Harness::new();
        let manager = h.manager();

        let url = manager.login().await.unwrap();

        let verifier = h.local.value(LOCAL_KEY_VERIFIER).unwrap();
        assert_eq!(verifier.len(), 128);
        let challenge = PKCEChallenge::from_verifier(verifier).code_challenge;
        assert!(url.contains(&challenge));
        assert_eq!(manager.state(), SessionState::Authorizing);
    }

    #[tokio::test]
    async fn complete_login_writes_remote_record_and_clears_verifier() {
        let h = Harness::new();
        let manager = h.manager();
        manager.login().await.unwrap();
        let verifier = h.local.value(LOCAL_KEY_VERIFIER).unwrap();

        assert!(manager.complete_login("auth-code").await);

        assert_eq!(h.exchanger.last_exchange(), Some(("auth-code".to_string(), verifier)));
        assert!(h.local.value(LOCAL_KEY_VERIFIER).is_none());
        assert_eq!(h.local.value(LOCAL_KEY_USER_ID).as_deref(), Some("user-1"));
        let record = h.remote.record("user-1").unwrap();
        assert_eq!(record.access_token, "mock_access_token");
        assert_eq!(record.refresh_token, "mock_refresh_token");
        assert_eq!(manager.state(), SessionState::RemoteResident);
        assert_eq!(manager.current_user_id().as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn failed_exchange_still_discards_verifier() {
        let h = Harness::new();
        h.exchanger.fail_exchange_with(Some(400));
        let manager = h.manager();
        manager.login().await.unwrap();

        let result = manager.try_complete_login("stale-code").await;

        assert!(matches!(result, Err(AuthError::TokenExchange { status: Some(400), .. })));
        assert!(h.local.value(LOCAL_KEY_VERIFIER).is_none());
        assert_eq!(manager.state(), SessionState::Failed);
        assert_eq!(h.remote.upsert_count(), 0);
    }

    #[tokio::test]
    async fn redirect_mismatch_is_reported_as_its_own_kind() {
        let h = Harness::new();
        h.exchanger.set_redirect_mismatch(true);
        let manager = h.manager();
        let mut events = manager.subscribe();
        manager.login().await.unwrap();

        assert!(!manager.complete_login("code").await);

        let mut saw_mismatch = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, AuthEvent::AuthFailed { kind: "redirect_mismatch", .. }) {
                saw_mismatch = true;
            }
        }
        assert!(saw_mismatch);
    }

    #[tokio::test]
    async fn complete_login_without_verifier_fails() {
        let h = Harness::new();
        let manager = h.manager();

        let result = manager.try_complete_login("code").await;

        assert!(matches!(result, Err(AuthError::TokenExchange { status: None, .. })));
        assert_eq!(h.exchanger.exchange_calls(), 0);
    }

    #[tokio::test]
    async fn complete_login_parks_tokens_when_store_is_down() {
        let h = Harness::new();
        h.remote.set_available(false);
        let manager = h.manager();
        manager.login().await.unwrap();

        let state = manager.try_complete_login("code").await.unwrap();

        assert_eq!(state, SessionState::LocalOnly);
        assert_eq!(h.local.value(LOCAL_KEY_ACCESS_TOKEN).as_deref(), Some("mock_access_token"));
        assert_eq!(h.local.value(LOCAL_KEY_EXPIRY_TIME).as_deref(), Some("3600"));
        assert!(manager.current_user_id().is_none());

        // Store comes back: the next request migrates the parked tokens.
        h.remote.set_available(true);
        assert_eq!(manager.get_usable_token().await.as_deref(), Some("mock_access_token"));
        assert!(h.local.value(LOCAL_KEY_ACCESS_TOKEN).is_none());
        assert!(h.remote.record("user-1").is_some());
    }

    #[tokio::test]
    async fn parked_login_tokens_win_over_older_remote_record() {
        let h = Harness::new();
        h.remote.insert(CredentialRecord::new(
            "user-1",
            "A-old",
            "R-old",
            Utc::now() - ChronoDuration::seconds(3700),
            3600,
        ));
        let manager = h.manager().with_session(SessionContext::for_user("user-1"));
        manager.login().await.unwrap();

        h.remote.set_available(false);
        let state = manager.try_complete_login("code").await.unwrap();
        assert_eq!(state, SessionState::LocalOnly);
        assert!(manager.current_user_id().is_none());

        h.remote.set_available(true);
        let token = manager.get_usable_token().await;

        assert_eq!(token.as_deref(), Some("mock_access_token"));
        assert_eq!(h.exchanger.refresh_calls(), 0);
        let record = h.remote.record("user-1").unwrap();
        assert_eq!(record.access_token, "mock_access_token");
        assert_eq!(record.refresh_token, "mock_refresh_token");
        assert!(h.local.value(LOCAL_KEY_ACCESS_TOKEN).is_none());
    }

    #[tokio::test]
    async fn out_of_range_local_expiry_does_not_panic() {
        let h = Harness::new();
        let now = LocalCredentials::generation_time_value(Utc::now());
        for (k, v) in [
            (LOCAL_KEY_ACCESS_TOKEN, "A"),
            (LOCAL_KEY_REFRESH_TOKEN, "R"),
            (LOCAL_KEY_EXPIRY_TIME, "9223372036854775"),
            (LOCAL_KEY_TOKEN_GENERATION_TIME, now.as_str()),
        ] {
            h.local.set(k, v).await.unwrap();
        }
        let manager = Arc::new(h.manager());

        let token = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.get_usable_token().await }
        })
        .await
        .expect("token request must not panic");

        // Treated as stale: migrated, then refreshed before use.
        assert_eq!(token.as_deref(), Some("refreshed_access_token"));
        assert_eq!(h.exchanger.refresh_calls(), 1);
        assert!(h.remote.record("user-1").unwrap().is_usable());
    }

    #[tokio::test]
    async fn out_of_range_remote_lifetime_is_refreshed() {
        let h = Harness::new();
        h.remote.insert(CredentialRecord::new("user-1", "A", "R", Utc::now(), i64::MAX));
        let manager = h.manager().with_session(SessionContext::for_user("user-1"));

        assert_eq!(manager.get_usable_token().await.as_deref(), Some("refreshed_access_token"));
        assert_eq!(h.exchanger.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn usable_remote_record_is_returned_without_refresh() {
        let h = Harness::new();
        h.remote.insert(CredentialRecord::new(
            "user-1",
            "A",
            "R",
            Utc::now() - ChronoDuration::seconds(10),
            3600,
        ));
        let manager = h.manager().with_session(SessionContext::for_user("user-1"));

        assert_eq!(manager.get_usable_token().await.as_deref(), Some("A"));
        assert_eq!(h.exchanger.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn stale_remote_record_is_refreshed_and_rotated() {
        let h = Harness::new();
        h.remote.insert(CredentialRecord::new(
            "user-1",
            "A",
            "R",
            Utc::now() - ChronoDuration::seconds(3700),
            3600,
        ));
        let manager = h.manager().with_session(SessionContext::for_user("user-1"));

        let token = manager.get_usable_token().await;

        assert_eq!(token.as_deref(), Some("refreshed_access_token"));
        assert_eq!(h.exchanger.last_refresh_token().as_deref(), Some("R"));
        let record = h.remote.record("user-1").unwrap();
        assert_eq!(record.refresh_token, "refreshed_refresh_token");
        assert!(record.is_usable());
    }

    #[tokio::test]
    async fn refresh_without_rotation_keeps_refresh_token() {
        let h = Harness::new();
        h.exchanger.set_refresh_response(TokenGrant::new("A2".to_string(), None, 3600));
        h.remote.insert(CredentialRecord::new(
            "user-1",
            "A",
            "R",
            Utc::now() - ChronoDuration::seconds(3700),
            3600,
        ));
        let manager = h.manager().with_session(SessionContext::for_user("user-1"));

        assert_eq!(manager.get_usable_token().await.as_deref(), Some("A2"));
        assert_eq!(h.remote.record("user-1").unwrap().refresh_token, "R");
    }

    #[tokio::test]
    async fn absent_remote_record_requires_login() {
        let h = Harness::new();
        let manager = h.manager().with_session(SessionContext::for_user("user-1"));

        let result = manager.try_get_usable_token().await;

        assert_eq!(result, Err(AuthError::LoginRequired));
        assert_eq!(manager.state(), SessionState::NoCredential);
    }

    #[tokio::test]
    async fn empty_stores_require_login() {
        let h = Harness::new();
        let manager = h.manager();

        assert!(manager.get_usable_token().await.is_none());
        assert_eq!(h.identity.calls(), 0);
    }

    #[tokio::test]
    async fn unreachable_store_fails_closed_and_keeps_session() {
        let h = Harness::new();
        h.remote.set_available(false);
        let manager = h.manager().with_session(SessionContext::for_user("user-1"));

        let result = manager.try_get_usable_token().await;

        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
        assert_eq!(manager.current_user_id().as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn usable_local_token_rejected_by_identity_is_not_returned() {
        let h = Harness::new();
        let now = Utc::now();
        for (k, v) in [
            (LOCAL_KEY_ACCESS_TOKEN, "revoked".to_string()),
            (LOCAL_KEY_REFRESH_TOKEN, "R".to_string()),
            (LOCAL_KEY_EXPIRY_TIME, "3600".to_string()),
            (LOCAL_KEY_TOKEN_GENERATION_TIME, LocalCredentials::generation_time_value(now)),
        ] {
            h.local.set(k, &v).await.unwrap();
        }
        let manager = h.manager();

        let result = manager.try_get_usable_token().await;

        assert!(matches!(result, Err(AuthError::IdentityResolution(_))));
        assert_eq!(h.local.value(LOCAL_KEY_ACCESS_TOKEN).as_deref(), Some("revoked"));
        assert_eq!(h.remote.upsert_count(), 0);
        assert_eq!(manager.state(), SessionState::LocalOnly);
    }

    #[tokio::test]
    async fn stale_local_token_is_refreshed_then_migrated() {
        let h = Harness::new();
        let long_ago = Utc::now() - ChronoDuration::seconds(7200);
        for (k, v) in [
            (LOCAL_KEY_ACCESS_TOKEN, "expired".to_string()),
            (LOCAL_KEY_REFRESH_TOKEN, "R".to_string()),
            (LOCAL_KEY_EXPIRY_TIME, "3600".to_string()),
            (LOCAL_KEY_TOKEN_GENERATION_TIME, LocalCredentials::generation_time_value(long_ago)),
        ] {
            h.local.set(k, &v).await.unwrap();
        }
        let manager = h.manager();

        let token = manager.get_usable_token().await;

        assert_eq!(token.as_deref(), Some("refreshed_access_token"));
        assert_eq!(h.exchanger.refresh_calls(), 1);
        let record = h.remote.record("user-1").unwrap();
        assert_eq!(record.refresh_token, "refreshed_refresh_token");
        assert!(h.local.value(LOCAL_KEY_REFRESH_TOKEN).is_none());
    }

    #[tokio::test]
    async fn stale_local_token_rejected_after_refresh_is_kept_locally() {
        let h = Harness::new();
        let manager = CredentialLifecycleManager::new(
            Arc::new(h.exchanger.clone()),
            Arc::new(StaticIdentityResolver::new()),
            Arc::new(h.local.clone()),
            Arc::new(h.remote.clone()),
        );
        let long_ago = Utc::now() - ChronoDuration::seconds(7200);
        for (k, v) in [
            (LOCAL_KEY_ACCESS_TOKEN, "expired".to_string()),
            (LOCAL_KEY_REFRESH_TOKEN, "R".to_string()),
            (LOCAL_KEY_EXPIRY_TIME, "3600".to_string()),
            (LOCAL_KEY_TOKEN_GENERATION_TIME, LocalCredentials::generation_time_value(long_ago)),
        ] {
            h.local.set(k, &v).await.unwrap();
        }

        let result = manager.try_get_usable_token().await;

        assert!(matches!(result, Err(AuthError::IdentityResolution(_))));
        assert_eq!(h.exchanger.refresh_calls(), 1);
        assert_eq!(
            h.local.value(LOCAL_KEY_ACCESS_TOKEN).as_deref(),
            Some("refreshed_access_token")
        );
        assert_eq!(
            h.local.value(LOCAL_KEY_REFRESH_TOKEN).as_deref(),
            Some("refreshed_refresh_token")
        );
        assert_eq!(h.remote.upsert_count(), 0);
        assert!(manager.current_user_id().is_none());

        // The rewritten local token is fresh, so it is not refreshed again.
        assert!(manager.get_usable_token().await.is_none());
        assert_eq!(h.exchanger.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn failed_migration_write_keeps_local_tokens() {
        let h = Harness::new();
        h.remote.set_available(false);
        let now = Utc::now();
        for (k, v) in [
            (LOCAL_KEY_ACCESS_TOKEN, "A".to_string()),
            (LOCAL_KEY_REFRESH_TOKEN, "R".to_string()),
            (LOCAL_KEY_EXPIRY_TIME, "3600".to_string()),
            (LOCAL_KEY_TOKEN_GENERATION_TIME, LocalCredentials::generation_time_value(now)),
        ] {
            h.local.set(k, &v).await.unwrap();
        }
        let manager = h.manager();

        let result = manager.try_get_usable_token().await;

        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
        assert_eq!(h.local.value(LOCAL_KEY_REFRESH_TOKEN).as_deref(), Some("R"));
        assert!(manager.current_user_id().is_none());
    }

    #[tokio::test]
    async fn log_out_emits_reset_after_delay() {
        let h = Harness::new();
        let manager = h.manager();
        let mut events = manager.subscribe();

        manager.log_out().await;

        assert_eq!(events.recv().await.unwrap(), AuthEvent::LoggedOut);
        let reset = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reset, AuthEvent::SessionReset);
    }
}
