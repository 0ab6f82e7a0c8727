//! OAuth bearer tokens for the Google backends.
//!
//! Access tokens minted from a refresh token live about an hour. Both the
//! sheets store and the Gmail notifier share one [`TokenSource`] so a
//! refresh done by either is seen by the other.

mod token;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::debug;

pub use token::{RefreshingToken, StaticToken};

/// Errors obtaining an access token.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("Token request failed: {0}")]
    Request(String),

    #[error("Token endpoint error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse token response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Supplies bearer tokens for outgoing API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A token believed to be valid right now.
    async fn access_token(&self) -> Result<String, TokenError>;

    /// Forget the current token after the API rejected it. Returns whether
    /// a different token can be obtained.
    async fn invalidate(&self) -> bool;
}

/// Failure sending an authorized request.
#[derive(Debug)]
pub enum SendError {
    Token(TokenError),
    Http(reqwest::Error),
}

/// Send the request built by `build` with a bearer token. A 401 drops the
/// token and the request is sent once more with a fresh one.
pub async fn send_authorized<F>(tokens: &dyn TokenSource, build: F) -> Result<Response, SendError>
where
    F: Fn() -> RequestBuilder,
{
    let token = tokens.access_token().await.map_err(SendError::Token)?;
    let response = build()
        .bearer_auth(&token)
        .send()
        .await
        .map_err(SendError::Http)?;

    if response.status() != StatusCode::UNAUTHORIZED || !tokens.invalidate().await {
        return Ok(response);
    }

    debug!("Access token rejected, retrying with a refreshed one");
    let token = tokens.access_token().await.map_err(SendError::Token)?;
    build()
        .bearer_auth(&token)
        .send()
        .await
        .map_err(SendError::Http)
}
