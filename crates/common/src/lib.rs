//! Modular common utilities shared across CleanPlayer crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: PKCE generation and OAuth wire types
//! - `platform`: the HTTP token exchanger and its trait seam
//! - `observability`: tracing (pulled in by `platform`)
//! - `test-utils`: scripted mock exchanger for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation + platform tiers
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{OAuthClient, OAuthClientError, TokenExchanger};
#[cfg(feature = "foundation")]
pub use auth::{OAuthConfig, OAuthError, PKCEChallenge, PkceError, TokenGrant};
