use async_trait::async_trait;
use cleanplayer_core::IdentityResolver;
use cleanplayer_domain::{CleanPlayerError, Result};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::status_error;
use crate::http::HttpClient;

/// Subset of `GET /v1/me` the session needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpotifyProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

/// Resolves the provider user id that owns an access token
#[derive(Debug, Clone)]
pub struct SpotifyProfileClient {
    http: HttpClient,
    api_base_url: String,
}

impl SpotifyProfileClient {
    #[must_use]
    pub fn new(http: HttpClient, api_base_url: &str) -> Self {
        Self { http, api_base_url: api_base_url.trim_end_matches('/').to_string() }
    }

    /// Fetch the profile of the token's owner.
    ///
    /// # Errors
    /// - `Auth` when the token is rejected (401/403)
    /// - `InvalidInput` when the body has no user id
    /// - `Network` for transport failures and other statuses
    pub async fn current_profile(&self, access_token: &str) -> Result<SpotifyProfile> {
        let url = format!("{}/v1/me", self.api_base_url);
        let response =
            self.http.send(self.http.authorized(Method::GET, url, access_token)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Profile endpoint rejected token");
            return Err(match status_error("profile endpoint", status, &body) {
                err @ CleanPlayerError::Auth(_) => err,
                other => CleanPlayerError::Network(other.to_string()),
            });
        }

        let profile: SpotifyProfile = response
            .json()
            .await
            .map_err(|e| CleanPlayerError::InvalidInput(format!("Malformed profile body: {e}")))?;

        if profile.id.is_empty() {
            return Err(CleanPlayerError::InvalidInput("Profile response has no id".to_string()));
        }

        Ok(profile)
    }
}

#[async_trait]
impl IdentityResolver for SpotifyProfileClient {
    async fn resolve_user_id(&self, access_token: &str) -> Result<String> {
        let profile = self.current_profile(access_token).await?;
        debug!(user_id = %profile.id, "Resolved token owner");
        Ok(profile.id)
    }
}
