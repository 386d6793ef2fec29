use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use logscope_types::Token;

use crate::error::AuthError;

/// Source of short-lived credentials for the streaming transport
///
/// Implementations make one attempt per call; retrying is the caller's decision.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self) -> Result<Token, AuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Fetches tokens from the dashboard API's credential endpoint
pub struct HttpTokenProvider {
    client: reqwest::Client,
    url: String,
    bearer: Option<String>,
    last: RwLock<Option<Token>>,
}

impl HttpTokenProvider {
    /// `api_url` is the API base, `token_path` the endpoint path (e.g. `/auth/jwt/`)
    pub fn new(api_url: &str, token_path: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AuthError::Client)?;

        Ok(Self {
            client,
            url: join_url(api_url, token_path),
            bearer: None,
            last: RwLock::new(None),
        })
    }

    /// Authenticate credential requests with a bearer token
    pub fn with_bearer(mut self, bearer: Option<String>) -> Self {
        self.bearer = bearer.filter(|b| !b.is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Last token successfully fetched this session
    pub fn last(&self) -> Option<Token> {
        self.last.read().clone()
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch(&self) -> Result<Token, AuthError> {
        let mut request = self.client.get(&self.url);
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer);
        }

        let response = request.send().await.map_err(|source| AuthError::Unreachable {
            url: self.url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| AuthError::Unreachable {
            url: self.url.clone(),
            source,
        })?;

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            debug!(error = %e, "token response is not JSON");
            AuthError::Malformed(e.to_string())
        })?;

        let token = match parsed.token {
            Some(value) if !value.is_empty() => Token::new(value),
            _ => return Err(AuthError::Malformed("response has no token field".to_string())),
        };

        info!("fetched log stream token");
        *self.last.write() = Some(token.clone());
        Ok(token)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> HttpTokenProvider {
        HttpTokenProvider::new(&server.uri(), "/auth/jwt/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h:8000/", "/auth/jwt/"), "http://h:8000/auth/jwt/");
        assert_eq!(join_url("http://h:8000", "auth/jwt/"), "http://h:8000/auth/jwt/");
    }

    #[tokio::test]
    async fn test_fetch_success_remembers_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/jwt/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":"abc"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        assert!(provider.last().is_none());

        let token = provider.fetch().await.unwrap();
        assert_eq!(token.value, "abc");
        assert_eq!(provider.last(), Some(Token::new("abc")));
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/jwt/"))
            .and(header("authorization", "Bearer session-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":"abc"}"#))
            .mount(&server)
            .await;

        let provider = provider(&server).with_bearer(Some("session-key".to_string()));
        assert!(provider.fetch().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_token_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"detail":"ok"}"#))
            .mount(&server)
            .await;

        let err = provider(&server).fetch().await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_empty_token_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":""}"#))
            .mount(&server)
            .await;

        let err = provider(&server).fetch().await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_non_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = provider(&server).fetch().await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_http_error_status_does_not_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, AuthError::HttpStatus { status: 401 }));
        assert!(provider.last().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let provider =
            HttpTokenProvider::new("http://127.0.0.1:1", "/auth/jwt/", Duration::from_secs(2))
                .unwrap();
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, AuthError::Unreachable { .. }));
    }
}
