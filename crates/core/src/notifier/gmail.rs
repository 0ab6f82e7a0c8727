//! Gmail API backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{is_plain_address, NotifyError, Notifier};
use crate::config::GmailConfig;
use crate::metrics::observe_external;
use crate::oauth::{send_authorized, SendError, TokenSource};

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Sends mail through `users/me/messages/send` with a bearer token.
pub struct GmailNotifier {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    sender: String,
    send_url: String,
}

#[derive(Debug, Serialize)]
struct SendRequest {
    raw: String,
}

impl GmailNotifier {
    pub fn new(config: &GmailConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| NotifyError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            tokens,
            sender: config.sender.clone(),
            send_url: GMAIL_SEND_URL.to_string(),
        })
    }

    /// Send to a different endpoint (e.g. a local emulator).
    pub fn with_send_url(mut self, url: impl Into<String>) -> Self {
        self.send_url = url.into();
        self
    }
}

/// Header values must stay on their own line.
fn check_header(header: &'static str, value: &str) -> Result<(), NotifyError> {
    if value.contains(['\r', '\n']) {
        return Err(NotifyError::InvalidHeader {
            header,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// RFC 2822 plain-text message, base64url encoded for the `raw` field.
fn build_raw_message(
    from: &str,
    to: &[String],
    subject: &str,
    body: &str,
) -> Result<String, NotifyError> {
    check_header("From", from)?;
    check_header("Subject", subject)?;
    if let Some(bad) = to.iter().find(|address| !is_plain_address(address)) {
        return Err(NotifyError::InvalidHeader {
            header: "To",
            value: bad.clone(),
        });
    }

    let mut message = String::new();
    if !from.is_empty() {
        message.push_str(&format!("From: {}\r\n", from));
    }
    message.push_str(&format!("To: {}\r\n", to.join(", ")));
    message.push_str(&format!("Subject: {}\r\n", subject));
    message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("\r\n");
    message.push_str(&body.replace("\r\n", "\n").replace('\n', "\r\n"));

    Ok(URL_SAFE.encode(message.as_bytes()))
}

#[async_trait]
impl Notifier for GmailNotifier {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn notify(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let started = Instant::now();
        let request = SendRequest {
            raw: build_raw_message(&self.sender, recipients, subject, body)?,
        };

        let result: Result<(), NotifyError> = async {
            let response = send_authorized(self.tokens.as_ref(), || {
                self.client.post(&self.send_url).json(&request)
            })
            .await
            .map_err(|e| match e {
                SendError::Token(e) => NotifyError::Auth(e.to_string()),
                SendError::Http(e) => NotifyError::Request(e.to_string()),
            })?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Api {
                    status,
                    body: body.chars().take(200).collect(),
                });
            }
            Ok(())
        }
        .await;

        observe_external("gmail", "send", result.is_ok(), started.elapsed().as_secs_f64());
        if result.is_ok() {
            debug!(to = %recipients.join(", "), subject, "Mail sent");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::StaticToken;

    fn notifier() -> GmailNotifier {
        GmailNotifier::new(
            &GmailConfig {
                access_token: "token".to_string(),
                sender: String::new(),
                timeout_secs: 5,
            },
            Arc::new(StaticToken::new("token")),
        )
        .unwrap()
    }

    fn decode(raw: &str) -> String {
        String::from_utf8(URL_SAFE.decode(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_raw_message_headers_and_body() {
        let raw = build_raw_message(
            "steward@example.com",
            &["a@example.com".to_string(), "b@example.com".to_string()],
            "VLAN change fail",
            "Device: 10.0.0.1\nStatus: Port not found",
        )
        .unwrap();
        let text = decode(&raw);

        assert!(text.starts_with("From: steward@example.com\r\n"));
        assert!(text.contains("To: a@example.com, b@example.com\r\n"));
        assert!(text.contains("Subject: VLAN change fail\r\n"));
        assert!(text.ends_with("\r\n\r\nDevice: 10.0.0.1\r\nStatus: Port not found"));
    }

    #[test]
    fn test_raw_message_is_url_safe() {
        let raw =
            build_raw_message("", &["x@example.com".to_string()], "??>>", "~~~???>>>").unwrap();
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert!(!decode(&raw).contains("From:"));
    }

    #[tokio::test]
    async fn test_no_recipients_is_an_error() {
        assert!(matches!(
            notifier().notify(&[], "VLAN Changed", "body").await,
            Err(NotifyError::NoRecipients)
        ));
    }

    #[test]
    fn test_recipient_cannot_inject_headers() {
        let result = build_raw_message(
            "steward@example.com",
            &["requester@example.org\r\nBcc: someone@elsewhere.test".to_string()],
            "VLAN Changed",
            "body",
        );
        assert!(matches!(
            result,
            Err(NotifyError::InvalidHeader { header: "To", .. })
        ));
    }

    #[test]
    fn test_subject_and_sender_cannot_inject_headers() {
        let to = ["requester@example.org".to_string()];
        assert!(matches!(
            build_raw_message("", &to, "VLAN Changed\nBcc: someone@elsewhere.test", "body"),
            Err(NotifyError::InvalidHeader {
                header: "Subject",
                ..
            })
        ));
        assert!(matches!(
            build_raw_message("steward@example.com\r\nX-Extra: 1", &to, "VLAN Changed", "body"),
            Err(NotifyError::InvalidHeader { header: "From", .. })
        ));
    }

    #[test]
    fn test_body_line_breaks_stay_in_body() {
        let raw = build_raw_message(
            "",
            &["requester@example.org".to_string()],
            "VLAN Changed",
            "Interface: Gi0/13\r\nBcc: someone@elsewhere.test",
        )
        .unwrap();
        let text = decode(&raw);
        let (headers, _) = text.split_once("\r\n\r\n").unwrap();
        assert!(!headers.contains("Bcc"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_never_sent() {
        // Unroutable URL: reaching the network would fail with Request.
        let notifier = notifier().with_send_url("http://127.0.0.1:9/send");
        assert!(matches!(
            notifier
                .notify(
                    &["a@example.org\nBcc: b@example.net".to_string()],
                    "VLAN Changed",
                    "body"
                )
                .await,
            Err(NotifyError::InvalidHeader { .. })
        ));
    }
}
