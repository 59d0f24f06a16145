use std::sync::Arc;

use cleanplayer_core::AccessTokenProvider;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::errors::PlayerError;
use super::types::{Paged, PlaybackState, QueueResponse, RepeatMode, Track};
use crate::http::HttpClient;

/// Authenticated Web API playback client
#[derive(Clone)]
pub struct PlayerClient {
    http: HttpClient,
    api_base_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl std::fmt::Debug for PlayerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerClient").field("api_base_url", &self.api_base_url).finish()
    }
}

impl PlayerClient {
    #[must_use]
    pub fn new(http: HttpClient, api_base_url: &str, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self { http, api_base_url: api_base_url.trim_end_matches('/').to_string(), tokens }
    }

    /// `PUT /me/player/repeat`
    pub async fn set_repeat(&self, mode: RepeatMode, device_id: &str) -> Result<(), PlayerError> {
        let request = self
            .authorized(Method::PUT, "/v1/me/player/repeat")
            .await?
            .query(&[("state", mode.as_str()), ("device_id", device_id)]);
        self.expect_success(request, "set repeat").await.map(drop)
    }

    /// `PUT /me/player/shuffle`
    pub async fn set_shuffle(&self, enabled: bool, device_id: &str) -> Result<(), PlayerError> {
        let state = if enabled { "true" } else { "false" };
        let request = self
            .authorized(Method::PUT, "/v1/me/player/shuffle")
            .await?
            .query(&[("state", state), ("device_id", device_id)]);
        self.expect_success(request, "set shuffle").await.map(drop)
    }

    /// Current playback, or `None` when nothing is playing (HTTP 204).
    pub async fn playback_state(&self) -> Result<Option<PlaybackState>, PlayerError> {
        let request = self.authorized(Method::GET, "/v1/me/player").await?;
        let response = self.expect_success(request, "playback state").await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    /// Seek by `delta_ms` from the current position, clamped at zero.
    ///
    /// Returns the position that was requested.
    pub async fn seek_relative(&self, delta_ms: i64) -> Result<u64, PlayerError> {
        let state = self.playback_state().await?.ok_or(PlayerError::NoActivePlayback)?;
        let current = state.progress_ms.ok_or(PlayerError::NoActivePlayback)?;

        let target = i64::try_from(current).unwrap_or(i64::MAX).saturating_add(delta_ms).max(0);
        let position = u64::try_from(target).unwrap_or_default();

        let request = self
            .authorized(Method::PUT, "/v1/me/player/seek")
            .await?
            .query(&[("position_ms", position)]);
        self.expect_success(request, "seek").await?;

        debug!(from = current, to = position, "Seeked playback");
        Ok(position)
    }

    /// Tracks of an album, first page.
    pub async fn album_tracks(&self, album_id: &str) -> Result<Vec<Track>, PlayerError> {
        let path = format!("/v1/albums/{album_id}/tracks");
        let request = self.authorized(Method::GET, &path).await?;
        let response = self.expect_success(request, "album tracks").await?;
        let page: Paged<Track> = decode(response).await?;
        Ok(page.items)
    }

    /// Upcoming items in the user's queue.
    pub async fn queue(&self) -> Result<Vec<Track>, PlayerError> {
        let request = self.authorized(Method::GET, "/v1/me/player/queue").await?;
        let response = self.expect_success(request, "queue").await?;
        let queue: QueueResponse = decode(response).await?;
        Ok(queue.queue)
    }

    /// Move playback to `device_id` without starting it.
    ///
    /// The API answers 200, 202 or 204 on success depending on the device.
    pub async fn transfer_playback(&self, device_id: &str) -> Result<(), PlayerError> {
        let request = self
            .authorized(Method::PUT, "/v1/me/player")
            .await?
            .json(&json!({ "device_ids": [device_id], "play": false }));
        let response = self.http.send(request).await?;
        let status = response.status();

        if matches!(status.as_u16(), 200 | 202 | 204) {
            debug!(device_id, "Transferred playback");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(device_id, status = status.as_u16(), "Playback transfer failed");
        Err(PlayerError::from_status("transfer playback", status, &body))
    }

    /// Start `context_uri` (album, playlist) at `offset_position`.
    pub async fn play_context(
        &self,
        context_uri: &str,
        offset_position: Option<u32>,
    ) -> Result<(), PlayerError> {
        let mut body = json!({ "context_uri": context_uri });
        if let Some(position) = offset_position {
            body["offset"] = json!({ "position": position });
        }

        let request = self.authorized(Method::PUT, "/v1/me/player/play").await?.json(&body);
        self.expect_success(request, "play").await.map(drop)
    }

    async fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, PlayerError> {
        let token = self.tokens.access_token().await.ok_or(PlayerError::NotAuthenticated)?;
        let url = format!("{}{path}", self.api_base_url);
        Ok(self.http.authorized(method, url, &token))
    }

    async fn expect_success(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Response, PlayerError> {
        let response = self.http.send(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(operation, status = status.as_u16(), "Playback request failed");
        Err(PlayerError::from_status(operation, status, &body))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PlayerError> {
    response.json::<T>().await.map_err(|e| PlayerError::Parse(e.to_string()))
}
