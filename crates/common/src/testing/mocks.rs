//! Mock implementations of common traits

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{OAuthClientError, OAuthError, PKCEChallenge, TokenExchanger, TokenGrant};

const MOCK_AUTHORIZE_URL: &str = "https://accounts.example.test/authorize";
const MOCK_REDIRECT_URI: &str = "http://localhost:5173/test/";

/// Scripted token exchanger
///
/// Cloning shares state, so a test can keep a handle while the manager owns
/// another.
#[derive(Debug, Clone)]
pub struct MockOAuthClient {
    inner: Arc<MockState>,
}

#[derive(Debug)]
struct MockState {
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    exchange_response: Mutex<TokenGrant>,
    refresh_response: Mutex<TokenGrant>,
    exchange_failure: Mutex<Option<u16>>,
    refresh_failure: Mutex<Option<u16>>,
    redirect_mismatch: Mutex<bool>,
    refresh_delay: Mutex<Duration>,
    last_exchange: Mutex<Option<(String, String)>>,
    last_refresh_token: Mutex<Option<String>>,
}

impl MockOAuthClient {
    /// Create a mock that succeeds with fixed tokens.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockState {
                exchange_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
                exchange_response: Mutex::new(TokenGrant::new(
                    "mock_access_token".to_string(),
                    Some("mock_refresh_token".to_string()),
                    3600,
                )),
                refresh_response: Mutex::new(TokenGrant::new(
                    "refreshed_access_token".to_string(),
                    Some("refreshed_refresh_token".to_string()),
                    3600,
                )),
                exchange_failure: Mutex::new(None),
                refresh_failure: Mutex::new(None),
                redirect_mismatch: Mutex::new(false),
                refresh_delay: Mutex::new(Duration::ZERO),
                last_exchange: Mutex::new(None),
                last_refresh_token: Mutex::new(None),
            }),
        }
    }

    /// Configure the tokens returned by `exchange_code`.
    pub fn set_exchange_response(&self, tokens: TokenGrant) {
        *self.inner.exchange_response.lock() = tokens;
    }

    /// Configure the tokens returned by `refresh`.
    pub fn set_refresh_response(&self, tokens: TokenGrant) {
        *self.inner.refresh_response.lock() = tokens;
    }

    /// Make `exchange_code` answer with this HTTP status.
    pub fn fail_exchange_with(&self, status: Option<u16>) {
        *self.inner.exchange_failure.lock() = status;
    }

    /// Make `refresh` answer with this HTTP status.
    pub fn fail_refresh_with(&self, status: Option<u16>) {
        *self.inner.refresh_failure.lock() = status;
    }

    /// Make `exchange_code` report a redirect URI mismatch.
    pub fn set_redirect_mismatch(&self, mismatch: bool) {
        *self.inner.redirect_mismatch.lock() = mismatch;
    }

    /// Hold each refresh open for `delay` before answering.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.inner.refresh_delay.lock() = delay;
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.inner.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    /// `(code, verifier)` of the most recent exchange
    #[must_use]
    pub fn last_exchange(&self) -> Option<(String, String)> {
        self.inner.last_exchange.lock().clone()
    }

    #[must_use]
    pub fn last_refresh_token(&self) -> Option<String> {
        self.inner.last_refresh_token.lock().clone()
    }

    fn rejection(status: u16, description: &str) -> OAuthClientError {
        OAuthClientError::TokenEndpoint {
            status,
            error: Some(OAuthError {
                error: "invalid_grant".to_string(),
                error_description: Some(description.to_string()),
            }),
        }
    }
}

impl Default for MockOAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenExchanger for MockOAuthClient {
    fn authorization_url(&self, challenge: &PKCEChallenge) -> String {
        format!(
            "{MOCK_AUTHORIZE_URL}?response_type=code&code_challenge_method=S256&code_challenge={}",
            challenge.code_challenge
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenGrant, OAuthClientError> {
        self.inner.exchange_calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_exchange.lock() = Some((code.to_string(), verifier.to_string()));

        if *self.inner.redirect_mismatch.lock() {
            return Err(OAuthClientError::RedirectMismatch(
                "invalid_grant: Invalid redirect URI".to_string(),
            ));
        }
        if let Some(status) = *self.inner.exchange_failure.lock() {
            return Err(Self::rejection(status, "Invalid authorization code"));
        }

        Ok(self.inner.exchange_response.lock().clone())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthClientError> {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.last_refresh_token.lock() = Some(refresh_token.to_string());

        let delay = *self.inner.refresh_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }
        if let Some(status) = *self.inner.refresh_failure.lock() {
            return Err(Self::rejection(status, "Refresh token revoked"));
        }

        Ok(self.inner.refresh_response.lock().clone())
    }

    fn redirect_uri(&self) -> &str {
        MOCK_REDIRECT_URI
    }
}
