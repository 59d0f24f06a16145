//! Trait seam for the token exchanger
//!
//! The lifecycle manager depends on this trait rather than on
//! [`OAuthClient`](super::OAuthClient), so tests can substitute a scripted
//! exchanger.

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::pkce::PKCEChallenge;
use super::types::TokenGrant;

/// The two token-endpoint round trips plus the authorize redirect
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Build the provider's authorize URL for `challenge`.
    fn authorization_url(&self, challenge: &PKCEChallenge) -> String;

    /// Exchange a single-use authorization code. Never retried.
    ///
    /// # Errors
    /// Returns `TokenEndpoint` with the HTTP status on any non-2xx response,
    /// or `RedirectMismatch` when the provider rejects the redirect URI.
    async fn exchange_code(&self, code: &str, verifier: &str)
        -> Result<TokenGrant, OAuthClientError>;

    /// Mint a new access token. The grant's `refresh_token` is `None` when the
    /// provider did not rotate it.
    ///
    /// # Errors
    /// Returns `TokenEndpoint` with the HTTP status on any non-2xx response.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthClientError>;

    /// The redirect URI sent on both legs of the flow
    fn redirect_uri(&self) -> &str;
}
