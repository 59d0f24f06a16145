use std::time::Duration;

use cleanplayer_domain::CleanPlayerError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

/// HTTP client with a request timeout and shared default headers.
///
/// Every request is sent exactly once. Token and store calls are not
/// idempotent from the provider's point of view, so failures go back to the
/// caller as-is.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, CleanPlayerError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Create a request carrying `Authorization: Bearer <token>`.
    pub fn authorized<U>(&self, method: Method, url: U, access_token: &str) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url).bearer_auth(access_token)
    }

    /// Execute the provided request builder.
    ///
    /// Any response, including 5xx, is returned for the caller to map.
    /// Transport failures become `CleanPlayerError`.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, CleanPlayerError> {
        let request = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            CleanPlayerError::from(infra)
        })?;

        let method = request.method().clone();
        let path = request.url().path().to_string();
        debug!(%method, %path, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %path, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %path, error = %err, "HTTP request failed");
                let infra: InfraError = err.into();
                Err(CleanPlayerError::from(infra))
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: HeaderMap,
    use_system_proxy: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: HeaderMap::new(),
            use_system_proxy: std::env::var_os("CLEANPLAYER_DISABLE_PROXY").is_none(),
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Add a header sent with every request.
    ///
    /// # Errors
    /// Returns `CleanPlayerError::Config` if the value is not a valid header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, CleanPlayerError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CleanPlayerError::Config(format!("invalid header name {name}: {e}")))?;
        let mut header_value = HeaderValue::from_str(value).map_err(|e| {
            CleanPlayerError::Config(format!("invalid value for header {name}: {e}"))
        })?;
        if header_name == AUTHORIZATION || header_name.as_str() == "apikey" {
            header_value.set_sensitive(true);
        }
        self.default_headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn use_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    pub fn build(self) -> Result<HttpClient, CleanPlayerError> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .default_headers(self.default_headers);

        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            CleanPlayerError::from(infra)
        })?;

        Ok(HttpClient { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::{Method, StatusCode};
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn local_builder() -> HttpClientBuilder {
        HttpClient::builder().use_system_proxy(false).timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn server_errors_are_returned_without_resending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = local_builder().build().expect("http client");
        let response =
            client.send(client.request(Method::POST, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn authorized_requests_carry_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer A1"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = local_builder().header("apikey", "anon").unwrap().build().unwrap();
        let response =
            client.send(client.authorized(Method::GET, server.uri(), "A1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn connection_refused_maps_to_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{addr}");

        let client = local_builder().build().expect("http client");

        match client.send(client.request(Method::GET, &url)).await {
            Err(CleanPlayerError::Network(msg)) => {
                assert!(msg.to_lowercase().contains("http"));
            }
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_header_values() {
        let result = HttpClient::builder().header("apikey", "bad\nvalue");
        assert!(matches!(result, Err(CleanPlayerError::Config(_))));
    }
}
