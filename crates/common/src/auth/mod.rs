//! OAuth 2.0 Authorization Code + PKCE plumbing
//!
//! Provider-agnostic building blocks for the Spotify accounts service (or
//! any RFC 6749 server that accepts public clients):
//!
//! - **[`pkce`]**: RFC 7636 verifier generation and S256 challenge derivation
//! - **[`types`]**: `OAuthConfig`, token endpoint responses and errors
//! - **[`client`]**: reqwest-backed token exchanger (code and refresh grants)
//! - **[`traits`]**: the `TokenExchanger` seam used by the lifecycle manager
//!
//! ```text
//! login ──► PKCEChallenge::generate ──► OAuthClient::authorization_url
//!                                              │ (user agent redirect)
//! callback ──► OAuthClient::exchange_code(code, verifier) ──► TokenGrant
//! stale   ──► OAuthClient::refresh(refresh_token)         ──► TokenGrant
//! ```
//!
//! No client secret and no `state` parameter are used; the verifier is the
//! only proof of origin.

#[cfg(feature = "platform")]
pub mod client;
pub mod pkce;
#[cfg(feature = "platform")]
pub mod traits;
pub mod types;

#[cfg(feature = "platform")]
pub use client::{OAuthClient, OAuthClientError};
pub use pkce::{generate_code_challenge, generate_code_verifier, PKCEChallenge, PkceError};
#[cfg(feature = "platform")]
pub use traits::TokenExchanger;
pub use types::{OAuthConfig, OAuthError, TokenGrant, TokenResponse};
