//! Customer notifications
//!
//! Ledger mutations and invoice delivery tell the customer through whichever
//! channels are on file. Delivery is best-effort: every channel call is
//! bounded by a timeout and a failure is logged and reported, never raised.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use core_kernel::{CustomerId, DomainPort, PortError};

/// Outbound delivery of customer messages
#[async_trait]
pub trait NotificationSender: DomainPort {
    /// Returns true when the email was accepted for delivery
    async fn send_email(&self, address: &str, subject: &str, body: &str) -> bool;

    /// Returns true when the text message was accepted for delivery
    async fn send_message(&self, phone_number: &str, body: &str) -> bool;
}

/// Contact details for a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub customer_id: CustomerId,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Read-only lookup of customer contact details
#[async_trait]
pub trait CustomerDirectory: DomainPort {
    async fn contact(&self, customer_id: CustomerId) -> Result<Option<CustomerContact>, PortError>;
}

/// A message for the customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

impl Notice {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// What happened on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOutcome {
    Delivered,
    Failed,
    TimedOut,
    /// No address on file for this channel
    Skipped,
}

/// Per-channel outcome of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub email: ChannelOutcome,
    pub message: ChannelOutcome,
}

impl DeliveryReport {
    pub fn skipped() -> Self {
        Self {
            email: ChannelOutcome::Skipped,
            message: ChannelOutcome::Skipped,
        }
    }

    /// True when at least one channel delivered
    pub fn delivered(&self) -> bool {
        self.email == ChannelOutcome::Delivered || self.message == ChannelOutcome::Delivered
    }
}

/// Resolves a customer's channels and sends a notice to each of them
#[derive(Clone)]
pub struct CustomerNotifier {
    directory: Arc<dyn CustomerDirectory>,
    sender: Arc<dyn NotificationSender>,
    timeout: Duration,
}

impl CustomerNotifier {
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        sender: Arc<dyn NotificationSender>,
        timeout: Duration,
    ) -> Self {
        Self {
            directory,
            sender,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `notice` on every channel the customer has on file
    pub async fn notify(&self, customer_id: CustomerId, notice: &Notice) -> DeliveryReport {
        let contact = match self.directory.contact(customer_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                debug!(%customer_id, "No contact on file, skipping notification");
                return DeliveryReport::skipped();
            }
            Err(e) => {
                warn!(%customer_id, error = %e, "Customer lookup failed, skipping notification");
                return DeliveryReport::skipped();
            }
        };

        let email = match contact.email.as_deref().filter(|a| !a.is_empty()) {
            Some(address) => {
                self.bounded(
                    "email",
                    customer_id,
                    self.sender.send_email(address, &notice.subject, &notice.body),
                )
                .await
            }
            None => ChannelOutcome::Skipped,
        };

        let message = match contact.phone_number.as_deref().filter(|p| !p.is_empty()) {
            Some(phone) => {
                self.bounded(
                    "message",
                    customer_id,
                    self.sender.send_message(phone, &notice.body),
                )
                .await
            }
            None => ChannelOutcome::Skipped,
        };

        DeliveryReport { email, message }
    }

    async fn bounded<F>(&self, channel: &'static str, customer_id: CustomerId, send: F) -> ChannelOutcome
    where
        F: std::future::Future<Output = bool>,
    {
        match tokio::time::timeout(self.timeout, send).await {
            Ok(true) => ChannelOutcome::Delivered,
            Ok(false) => {
                warn!(%customer_id, channel, "Notification rejected by sender");
                ChannelOutcome::Failed
            }
            Err(_) => {
                warn!(
                    %customer_id,
                    channel,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Notification timed out"
                );
                ChannelOutcome::TimedOut
            }
        }
    }
}

impl std::fmt::Debug for CustomerNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerNotifier")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryCustomerDirectory, OutboxNotificationSender};

    fn contact(customer_id: CustomerId, email: Option<&str>, phone: Option<&str>) -> CustomerContact {
        CustomerContact {
            customer_id,
            full_name: "Rahim Uddin".to_string(),
            email: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_notify_uses_every_channel_on_file() {
        let customer = CustomerId::new();
        let directory = Arc::new(InMemoryCustomerDirectory::new());
        directory
            .insert(contact(customer, Some("rahim@example.com"), Some("+8801700000000")))
            .await;
        let sender = Arc::new(OutboxNotificationSender::new());
        let notifier = CustomerNotifier::new(directory, sender.clone(), Duration::from_secs(1));

        let report = notifier.notify(customer, &Notice::new("Hi", "Body")).await;

        assert_eq!(report.email, ChannelOutcome::Delivered);
        assert_eq!(report.message, ChannelOutcome::Delivered);
        assert_eq!(sender.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_skipped() {
        let notifier = CustomerNotifier::new(
            Arc::new(InMemoryCustomerDirectory::new()),
            Arc::new(OutboxNotificationSender::new()),
            Duration::from_secs(1),
        );
        let report = notifier.notify(CustomerId::new(), &Notice::new("Hi", "Body")).await;
        assert_eq!(report, DeliveryReport::skipped());
        assert!(!report.delivered());
    }

    #[tokio::test]
    async fn test_one_failing_channel_still_delivers() {
        let customer = CustomerId::new();
        let directory = Arc::new(InMemoryCustomerDirectory::new());
        directory
            .insert(contact(customer, Some("rahim@example.com"), Some("+8801700000000")))
            .await;
        let sender = Arc::new(OutboxNotificationSender::new());
        sender.fail_email(true);
        let notifier = CustomerNotifier::new(directory, sender, Duration::from_secs(1));

        let report = notifier.notify(customer, &Notice::new("Hi", "Body")).await;
        assert_eq!(report.email, ChannelOutcome::Failed);
        assert!(report.delivered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sender_times_out() {
        let customer = CustomerId::new();
        let directory = Arc::new(InMemoryCustomerDirectory::new());
        directory.insert(contact(customer, None, Some("+8801700000000"))).await;
        let sender = Arc::new(OutboxNotificationSender::new());
        sender.set_delay(Duration::from_secs(30));
        let notifier = CustomerNotifier::new(directory, sender, Duration::from_secs(5));

        let report = notifier.notify(customer, &Notice::new("Hi", "Body")).await;
        assert_eq!(report.email, ChannelOutcome::Skipped);
        assert_eq!(report.message, ChannelOutcome::TimedOut);
    }
}
