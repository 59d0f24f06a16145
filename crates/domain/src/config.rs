//! Configuration management

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_ACCOUNTS_BASE_URL, DEFAULT_API_BASE_URL, DEFAULT_CLIENT_ID, DEFAULT_CREDENTIAL_TABLE,
    DEFAULT_KEYCHAIN_SERVICE, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, DEFAULT_SESSION_RESET_DELAY_MS,
    DEFAULT_SQLITE_PATH, DEFAULT_VERIFIER_LENGTH, VERIFIER_MAX_LENGTH, VERIFIER_MIN_LENGTH,
};
use crate::errors::{CleanPlayerError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity provider and Web API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    /// Must match the URI registered with the provider byte for byte.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub accounts_base_url: String,
    pub api_base_url: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            accounts_base_url: DEFAULT_ACCOUNTS_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl SpotifyConfig {
    /// Reject configurations that can only fail at the provider.
    ///
    /// # Errors
    /// Returns `CleanPlayerError::Config` for an empty client id or a
    /// redirect URI that is not an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(CleanPlayerError::Config("client_id must not be empty".to_string()));
        }

        let redirect = Url::parse(&self.redirect_uri).map_err(|e| {
            CleanPlayerError::Config(format!("Invalid redirect_uri '{}': {e}", self.redirect_uri))
        })?;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(CleanPlayerError::Config(format!(
                "redirect_uri must use http or https, got '{}'",
                redirect.scheme()
            )));
        }

        for base in [&self.accounts_base_url, &self.api_base_url] {
            Url::parse(base)
                .map_err(|e| CleanPlayerError::Config(format!("Invalid base URL '{base}': {e}")))?;
        }

        Ok(())
    }
}

/// Remote credential store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgREST-style HTTP table
    #[default]
    Rest,
    /// Local SQLite file, for single-host deployments and tests
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = CleanPlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(CleanPlayerError::Config(format!("Unknown store backend: {other}"))),
        }
    }
}

/// Remote credential store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub rest_url: Option<String>,
    #[serde(skip_serializing)]
    pub rest_api_key: Option<String>,
    pub table: String,
    pub sqlite_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Rest,
            rest_url: None,
            rest_api_key: None,
            table: DEFAULT_CREDENTIAL_TABLE.to_string(),
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
        }
    }
}

/// Per-session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Keychain service name used by the device-local store
    pub keychain_service: String,
    pub verifier_length: usize,
    /// Delay between `LoggedOut` and `SessionReset`
    pub session_reset_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            verifier_length: DEFAULT_VERIFIER_LENGTH,
            session_reset_delay_ms: DEFAULT_SESSION_RESET_DELAY_MS,
        }
    }
}

impl SessionConfig {
    /// # Errors
    /// Returns `CleanPlayerError::Config` if the verifier length is outside
    /// 43..=128.
    pub fn validate(&self) -> Result<()> {
        if !(VERIFIER_MIN_LENGTH..=VERIFIER_MAX_LENGTH).contains(&self.verifier_length) {
            return Err(CleanPlayerError::Config(format!(
                "verifier_length must be within {VERIFIER_MIN_LENGTH}..={VERIFIER_MAX_LENGTH}, got {}",
                self.verifier_length
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl Config {
    /// Validate every section.
    ///
    /// # Errors
    /// Returns the first `CleanPlayerError::Config` found.
    pub fn validate(&self) -> Result<()> {
        self.spotify.validate()?;
        self.session.validate()
    }
}
