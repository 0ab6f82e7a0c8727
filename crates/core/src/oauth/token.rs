use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{TokenError, TokenSource};
use crate::config::GoogleAuthConfig;
use crate::metrics::observe_external;

/// Refresh this long before the endpoint says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A fixed token from config. It cannot be renewed.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, TokenError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self) -> bool {
        warn!("Configured access token was rejected and cannot be refreshed");
        false
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Exchanges a refresh token for access tokens and caches each one until
/// shortly before it expires.
pub struct RefreshingToken {
    client: Client,
    config: GoogleAuthConfig,
    // Held across the refresh so concurrent callers wait for one exchange.
    cached: Mutex<Option<CachedToken>>,
}

impl RefreshingToken {
    pub fn new(config: &GoogleAuthConfig) -> Result<Self, TokenError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| TokenError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            cached: Mutex::new(None),
        })
    }

    async fn refresh(&self) -> Result<CachedToken, TokenError> {
        let started = Instant::now();
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let result: Result<TokenResponse, TokenError> = async {
            let response = self
                .client
                .post(&self.config.token_url)
                .form(&form)
                .send()
                .await
                .map_err(|e| TokenError::Request(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(TokenError::Api {
                    status,
                    body: body.chars().take(200).collect(),
                });
            }

            response
                .json()
                .await
                .map_err(|e| TokenError::Parse(e.to_string()))
        }
        .await;

        observe_external("google_oauth", "refresh", result.is_ok(), started.elapsed().as_secs_f64());
        let token = result?;
        debug!(expires_in = token.expires_in, "Refreshed Google access token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for RefreshingToken {
    async fn access_token(&self) -> Result<String, TokenError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.refresh().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn invalidate(&self) -> bool {
        *self.cached.lock().await = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::oauth::send_authorized;

    #[derive(Clone)]
    struct Endpoint {
        issued: Arc<AtomicUsize>,
        api_calls: Arc<AtomicUsize>,
        expires_in: u64,
        reject_grant: bool,
    }

    async fn token(
        State(endpoint): State<Endpoint>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        let valid = form.get("grant_type").map(String::as_str) == Some("refresh_token")
            && form.get("refresh_token").map(String::as_str) == Some("refresh-me")
            && form.get("client_id").map(String::as_str) == Some("steward-client");
        if endpoint.reject_grant || !valid {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant" })),
            );
        }
        let n = endpoint.issued.fetch_add(1, Ordering::SeqCst) + 1;
        (
            StatusCode::OK,
            Json(json!({
                "access_token": format!("token-{}", n),
                "expires_in": endpoint.expires_in,
                "token_type": "Bearer"
            })),
        )
    }

    /// Accepts only the second token ever issued.
    async fn api(State(endpoint): State<Endpoint>, headers: HeaderMap) -> StatusCode {
        endpoint.api_calls.fetch_add(1, Ordering::SeqCst);
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer token-2") => StatusCode::OK,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    async fn spawn_endpoint(expires_in: u64, reject_grant: bool) -> (String, Endpoint) {
        let endpoint = Endpoint {
            issued: Arc::new(AtomicUsize::new(0)),
            api_calls: Arc::new(AtomicUsize::new(0)),
            expires_in,
            reject_grant,
        };
        let app = Router::new()
            .route("/token", post(token))
            .route("/api", get(api))
            .with_state(endpoint.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base, endpoint)
    }

    fn auth_config(base: &str) -> GoogleAuthConfig {
        GoogleAuthConfig {
            client_id: "steward-client".to_string(),
            client_secret: "shh".to_string(),
            refresh_token: "refresh-me".to_string(),
            token_url: format!("{}/token", base),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_token_is_cached_until_invalidated() {
        let (base, endpoint) = spawn_endpoint(3600, false).await;
        let tokens = RefreshingToken::new(&auth_config(&base)).unwrap();

        assert_eq!(tokens.access_token().await.unwrap(), "token-1");
        assert_eq!(tokens.access_token().await.unwrap(), "token-1");
        assert_eq!(endpoint.issued.load(Ordering::SeqCst), 1);

        assert!(tokens.invalidate().await);
        assert_eq!(tokens.access_token().await.unwrap(), "token-2");
        assert_eq!(endpoint.issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_near_expiry_is_refreshed() {
        // Lifetime shorter than the margin: every call exchanges again.
        let (base, endpoint) = spawn_endpoint(30, false).await;
        let tokens = RefreshingToken::new(&auth_config(&base)).unwrap();

        assert_eq!(tokens.access_token().await.unwrap(), "token-1");
        assert_eq!(tokens.access_token().await.unwrap(), "token-2");
        assert_eq!(endpoint.issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_grant_is_an_api_error() {
        let (base, _) = spawn_endpoint(3600, true).await;
        let tokens = RefreshingToken::new(&auth_config(&base)).unwrap();

        match tokens.access_token().await {
            Err(TokenError::Api { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("expected Api error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_request_error() {
        let tokens = RefreshingToken::new(&auth_config("http://127.0.0.1:9")).unwrap();
        assert!(matches!(
            tokens.access_token().await,
            Err(TokenError::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_response_retries_with_fresh_token() {
        let (base, endpoint) = spawn_endpoint(3600, false).await;
        let tokens = RefreshingToken::new(&auth_config(&base)).unwrap();
        let client = Client::new();
        let url = format!("{}/api", base);

        let response = send_authorized(&tokens, || client.get(&url)).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(endpoint.issued.load(Ordering::SeqCst), 2);
        assert_eq!(endpoint.api_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_static_token_is_not_retried() {
        let (base, endpoint) = spawn_endpoint(3600, false).await;
        let tokens = StaticToken::new("expired");
        let client = Client::new();
        let url = format!("{}/api", base);

        let response = send_authorized(&tokens, || client.get(&url)).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(endpoint.api_calls.load(Ordering::SeqCst), 1);
        assert_eq!(endpoint.issued.load(Ordering::SeqCst), 0);
    }
}
