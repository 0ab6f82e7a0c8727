use async_trait::async_trait;
use tracing::info;

use super::{NotifyError, Notifier};

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
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
        info!(to = %recipients.join(", "), subject, "Notification\n{}", body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_requires_recipients() {
        let notifier = LogNotifier::new();
        assert!(matches!(
            notifier.notify(&[], "VLAN Changed", "body").await,
            Err(NotifyError::NoRecipients)
        ));
        tokio_test::assert_ok!(
            notifier
                .notify(&["ops@example.com".to_string()], "VLAN Changed", "body")
                .await
        );
    }
}
