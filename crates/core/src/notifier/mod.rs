//! Outcome notifications to requesters and operators.

mod gmail;
mod log;

use async_trait::async_trait;
use thiserror::Error;

pub use gmail::GmailNotifier;
pub use log::LogNotifier;

/// Characters that would let an address escape its header or turn into a
/// group or display-name form.
const ADDRESS_SPECIALS: &[char] = &['<', '>', '(', ')', ',', ';', ':', '"', '[', ']', '\\'];

/// Errors from a notifier backend.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// Nobody to send to.
    #[error("No recipients")]
    NoRecipients,

    /// Request never got a response.
    #[error("Request failed: {0}")]
    Request(String),

    /// Backend answered with an error status.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Backend is misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A header value would break out of its line.
    #[error("Invalid {header} header: {value:?}")]
    InvalidHeader { header: &'static str, value: String },

    /// Could not obtain a credential for the backend.
    #[error("Authorization failed: {0}")]
    Auth(String),
}

/// A bare `local@domain` address: no display name, no whitespace or control
/// characters, and a dotted domain.
pub fn is_plain_address(address: &str) -> bool {
    if address.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    if address.contains(ADDRESS_SPECIALS) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Sends a plain-text message.
///
/// Callers treat delivery as fire-and-forget: a failure is logged by the
/// caller and never changes a job's outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn notify(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_addresses_accepted() {
        assert!(is_plain_address("netops@example.org"));
        assert!(is_plain_address("first.last+vlan@mail.example.co.uk"));
    }

    #[test]
    fn test_header_breaking_addresses_rejected() {
        assert!(!is_plain_address("requester@example.org\r\nBcc: someone@elsewhere.test"));
        assert!(!is_plain_address("requester@example.org\nBcc: someone@elsewhere.test"));
        assert!(!is_plain_address("a@example.org, b@example.org"));
        assert!(!is_plain_address("Jane <jane@example.org>"));
        assert!(!is_plain_address("jane@example.org\t"));
    }

    #[test]
    fn test_malformed_addresses_rejected() {
        assert!(!is_plain_address(""));
        assert!(!is_plain_address("no-at-sign"));
        assert!(!is_plain_address("@example.org"));
        assert!(!is_plain_address("jane@"));
        assert!(!is_plain_address("jane@localhost"));
        assert!(!is_plain_address("jane@@example.org"));
        assert!(!is_plain_address("jane@example.org."));
    }
}
