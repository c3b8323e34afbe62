//! Log-only notification sender
//!
//! The worker has no mail or SMS gateway wired in; messages are written to
//! the log and reported as accepted.

use async_trait::async_trait;
use tracing::info;

use core_kernel::DomainPort;
use domain_credit::NotificationSender;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSender;

impl DomainPort for TracingNotificationSender {}

#[async_trait]
impl NotificationSender for TracingNotificationSender {
    async fn send_email(&self, address: &str, subject: &str, body: &str) -> bool {
        info!(channel = "email", address = %address, subject = %subject, bytes = body.len(), "Notification sent");
        true
    }

    async fn send_message(&self, phone_number: &str, body: &str) -> bool {
        info!(channel = "sms", phone_number = %phone_number, bytes = body.len(), "Notification sent");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_send_is_accepted() {
        let sender = TracingNotificationSender;
        assert!(sender.send_email("a@example.com", "Hi", "body").await);
        assert!(sender.send_message("+8801700000000", "body").await);
    }
}
