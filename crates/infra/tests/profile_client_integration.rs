//! Integration tests for the profile-endpoint identity resolver

use cleanplayer_core::IdentityResolver;
use cleanplayer_domain::CleanPlayerError;
use cleanplayer_infra::SpotifyProfileClient;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;

#[tokio::test]
async fn test_resolves_user_id_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "spotify-user",
            "display_name": "Listener",
            "product": "premium"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SpotifyProfileClient::new(support::local_http(), &server.uri());

    assert_eq!(client.resolve_user_id("A1").await.unwrap(), "spotify-user");
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "status": 401, "message": "The access token expired" }
        })))
        .mount(&server)
        .await;

    let client = SpotifyProfileClient::new(support::local_http(), &server.uri());

    match client.resolve_user_id("expired").await {
        Err(CleanPlayerError::Auth(msg)) => assert!(msg.contains("401")),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = SpotifyProfileClient::new(support::local_http(), &server.uri());

    assert!(matches!(client.resolve_user_id("A1").await, Err(CleanPlayerError::Network(_))));
}

#[tokio::test]
async fn test_profile_without_id_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "display_name": "x" })))
        .mount(&server)
        .await;

    let client = SpotifyProfileClient::new(support::local_http(), &server.uri());

    assert!(matches!(
        client.resolve_user_id("A1").await,
        Err(CleanPlayerError::InvalidInput(_))
    ));
}
