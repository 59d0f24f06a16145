//! Integration tests for the testing utilities exported to downstream crates

#![cfg(feature = "test-utils")]

use std::time::Duration;

use cleanplayer_common::auth::{PKCEChallenge, TokenExchanger, TokenGrant};
use cleanplayer_common::testing::MockOAuthClient;

/// Validates that the mock exchanger can be driven through the trait object
/// the lifecycle manager holds.
#[tokio::test]
async fn test_mock_through_trait_object() {
    let mock = MockOAuthClient::new();
    mock.set_exchange_response(TokenGrant::new("A".to_string(), Some("R".to_string()), 60));
    let exchanger: Box<dyn TokenExchanger> = Box::new(mock.clone());

    let pkce = PKCEChallenge::generate(64).unwrap();
    let url = exchanger.authorization_url(&pkce);
    assert!(url.contains(&pkce.code_challenge));

    let grant = exchanger.exchange_code("code", &pkce.code_verifier).await.unwrap();
    assert_eq!(grant.access_token, "A");
    assert_eq!(grant.expires_in, 60);
    assert_eq!(mock.exchange_calls(), 1);
}

/// Validates that the configured refresh delay holds the call open.
#[tokio::test]
async fn test_mock_refresh_delay() {
    let mock = MockOAuthClient::new();
    mock.set_refresh_delay(Duration::from_millis(50));

    let started = std::time::Instant::now();
    mock.refresh("R").await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(50));
}
