//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for authorization without client secrets. The
//! verifier alphabet is `[A-Za-z0-9]`, a subset of the RFC's unreserved set.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use cleanplayer_domain::constants::{
    DEFAULT_VERIFIER_LENGTH, VERIFIER_MAX_LENGTH, VERIFIER_MIN_LENGTH,
};

/// PKCE generation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PkceError {
    #[error("verifier length {length} outside 43..=128")]
    InvalidLength { length: usize },
}

/// Generate a code verifier of exactly `length` alphanumeric characters
///
/// # Errors
/// Returns [`PkceError::InvalidLength`] if `length` is outside 43..=128.
pub fn generate_code_verifier(length: usize) -> Result<String, PkceError> {
    if !(VERIFIER_MIN_LENGTH..=VERIFIER_MAX_LENGTH).contains(&length) {
        return Err(PkceError::InvalidLength { length });
    }

    Ok(rand::thread_rng().sample_iter(&Alphanumeric).take(length).map(char::from).collect())
}

/// Derive the S256 code challenge: `BASE64URL(SHA256(ASCII(verifier)))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Verifier/challenge pair for one authorization round trip
///
/// The verifier stays on the device until the code exchange; the challenge
/// travels with the authorize redirect.
#[derive(Debug, Clone)]
pub struct PKCEChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PKCEChallenge {
    /// # Examples
    /// ```
    /// use cleanplayer_common::auth::pkce::PKCEChallenge;
    ///
    /// let pair = PKCEChallenge::generate(128).expect("valid length");
    /// assert_eq!(pair.code_verifier.len(), 128);
    /// ```
    ///
    /// # Errors
    /// Returns [`PkceError`] for an out-of-range verifier length.
    pub fn generate(length: usize) -> Result<Self, PkceError> {
        let code_verifier = generate_code_verifier(length)?;
        Ok(Self::from_verifier(code_verifier))
    }

    /// Rebuild the pair from a stored verifier.
    #[must_use]
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Always "S256"; the plain method is never offered.
    #[must_use]
    pub fn challenge_method(&self) -> &str {
        "S256"
    }
}
