//! Shared helpers for infra integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cleanplayer_core::AccessTokenProvider;
use cleanplayer_infra::HttpClient;

/// Hands out a fixed token, or none.
pub struct FixedToken(pub Option<&'static str>);

#[async_trait]
impl AccessTokenProvider for FixedToken {
    async fn access_token(&self) -> Option<String> {
        self.0.map(ToString::to_string)
    }
}

/// HTTP client that talks straight to the local mock server.
pub fn local_http() -> HttpClient {
    HttpClient::builder().use_system_proxy(false).build().expect("http client")
}
