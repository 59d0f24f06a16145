//! Credential table behind a PostgREST-style HTTP API
//!
//! Rows live in `{base_url}/rest/v1/{table}` keyed by `spotify_user_id`.
//! Every request carries the project API key both as `apikey` and as a
//! bearer token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cleanplayer_core::CredentialRepository;
use cleanplayer_domain::{CleanPlayerError, CredentialRecord, Result};
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::errors::status_error;
use crate::http::HttpClient;

const SELECT_COLUMNS: &str =
    "spotify_user_id,access_token,refresh_token,expires_in,token_generated_at";

/// One row of the credential table
///
/// Token columns are nullable in the table; a null reads as an absent
/// token rather than failing the whole lookup.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialRow {
    spotify_user_id: String,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_generated_at: Option<DateTime<Utc>>,
}

impl From<&CredentialRecord> for CredentialRow {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            spotify_user_id: record.user_id.clone(),
            access_token: Some(record.access_token.clone()),
            refresh_token: Some(record.refresh_token.clone()),
            expires_in: Some(record.lifetime_seconds),
            token_generated_at: Some(record.issued_at),
        }
    }
}

impl From<CredentialRow> for CredentialRecord {
    fn from(row: CredentialRow) -> Self {
        CredentialRecord::new(
            row.spotify_user_id,
            row.access_token.unwrap_or_default(),
            row.refresh_token.unwrap_or_default(),
            row.token_generated_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            row.expires_in.unwrap_or_default(),
        )
    }
}

/// `CredentialRepository` over a PostgREST table
#[derive(Debug, Clone)]
pub struct RestCredentialRepository {
    http: HttpClient,
    table_url: Url,
    table: String,
}

impl RestCredentialRepository {
    /// # Errors
    /// Returns `CleanPlayerError::Config` if the base URL or API key is
    /// unusable.
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .header("apikey", api_key)?
            .header("authorization", &format!("Bearer {api_key}"))?
            .build()?;
        Self::with_http_client(http, base_url, table)
    }

    /// Use a preconfigured client. Authentication headers are the caller's
    /// responsibility.
    ///
    /// # Errors
    /// Returns `CleanPlayerError::Config` if the base URL is invalid.
    pub fn with_http_client(http: HttpClient, base_url: &str, table: &str) -> Result<Self> {
        if table.trim().is_empty() {
            return Err(CleanPlayerError::Config("credential table name is empty".to_string()));
        }

        let table_url = Url::parse(&format!(
            "{}/rest/v1/{table}",
            base_url.trim_end_matches('/')
        ))
        .map_err(|e| CleanPlayerError::Config(format!("Invalid store URL '{base_url}': {e}")))?;

        Ok(Self { http, table_url, table: table.to_string() })
    }

    fn url_with(&self, query: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut().extend_pairs(query);
        url
    }

    async fn check(&self, response: Response, operation: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(table = %self.table, operation, status = status.as_u16(), "Credential store rejected request");
        Err(match status_error(&format!("{} {operation}", self.table), status, &body) {
            // Rejections by the store surface as storage errors.
            CleanPlayerError::Auth(msg)
            | CleanPlayerError::InvalidInput(msg)
            | CleanPlayerError::NotFound(msg) => CleanPlayerError::Storage(msg),
            other => other,
        })
    }

    async fn fetch_rows(&self, query: &[(&str, &str)], operation: &str) -> Result<Vec<CredentialRow>> {
        let request = self.http.request(Method::GET, self.url_with(query));
        let response = self.check(self.http.send(request).await?, operation).await?;
        response
            .json::<Vec<CredentialRow>>()
            .await
            .map_err(|e| CleanPlayerError::Storage(format!("Malformed credential rows: {e}")))
    }
}

#[async_trait]
impl CredentialRepository for RestCredentialRepository {
    async fn upsert(&self, record: &CredentialRecord) -> Result<()> {
        debug!(table = %self.table, user_id = %record.user_id, "Upserting credential record");

        let request = self
            .http
            .request(Method::POST, self.url_with(&[("on_conflict", "spotify_user_id")]))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&CredentialRow::from(record));
        self.check(self.http.send(request).await?, "upsert").await?;
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        let filter = format!("eq.{user_id}");
        let rows = self
            .fetch_rows(&[("select", SELECT_COLUMNS), ("spotify_user_id", &filter)], "get")
            .await?;

        debug!(table = %self.table, user_id, found = !rows.is_empty(), "Fetched credential record");
        Ok(rows.into_iter().next().map(CredentialRecord::from))
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        debug!(table = %self.table, user_id, "Deleting credential record");

        let filter = format!("eq.{user_id}");
        let request =
            self.http.request(Method::DELETE, self.url_with(&[("spotify_user_id", &filter)]));
        self.check(self.http.send(request).await?, "delete").await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<CredentialRecord>> {
        let rows = self
            .fetch_rows(
                &[("select", SELECT_COLUMNS), ("order", "token_generated_at.desc")],
                "list",
            )
            .await?;
        Ok(rows.into_iter().map(CredentialRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_columns_read_as_absent_tokens() {
        let row: CredentialRow =
            serde_json::from_str(r#"{"spotify_user_id":"u1","access_token":null}"#).unwrap();
        let record = CredentialRecord::from(row);

        assert!(record.is_absent());
        assert_eq!(record.issued_at.timestamp(), 0);
        assert!(!record.is_usable());
    }

    #[test]
    fn rejects_empty_table_and_bad_url() {
        let http = HttpClient::new().unwrap();
        assert!(RestCredentialRepository::with_http_client(http.clone(), "https://db", " ").is_err());
        assert!(RestCredentialRepository::with_http_client(http, "not a url", "users").is_err());
    }

    #[test]
    fn builds_table_url_without_double_slash() {
        let repo =
            RestCredentialRepository::new("https://db.example.com/", "anon", "users").unwrap();
        assert_eq!(repo.table_url.as_str(), "https://db.example.com/rest/v1/users");
    }
}
