//! In-memory adapters for the credit ports
//!
//! Used by unit and integration tests and by anything that wants a ledger
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use core_kernel::{
    CalendarMonth, CreditEntryId, CustomerId, DomainPort, HealthCheckResult,
    HealthCheckable, InvoiceId, PortError, ShopId,
};

use crate::entry::{CreditEntry, CreditStatus};
use crate::invoice::Invoice;
use crate::notification::{CustomerContact, CustomerDirectory, NotificationSender};
use crate::ports::CreditStore;

#[derive(Debug, Default)]
struct Tables {
    entries: HashMap<CreditEntryId, CreditEntry>,
    invoices: HashMap<InvoiceId, Invoice>,
}

/// In-memory implementation of `CreditStore`
#[derive(Debug, Default, Clone)]
pub struct InMemoryCreditStore {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with a connection error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn entry_count(&self) -> usize {
        self.tables.read().await.entries.len()
    }

    pub async fn invoice_count(&self) -> usize {
        self.tables.read().await.invoices.len()
    }

    fn check_available(&self) -> Result<(), PortError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::connection("in-memory credit store unavailable"));
        }
        Ok(())
    }
}

impl DomainPort for InMemoryCreditStore {}

#[async_trait]
impl HealthCheckable for InMemoryCreditStore {
    async fn health_check(&self) -> HealthCheckResult {
        if self.unavailable.load(Ordering::SeqCst) {
            HealthCheckResult::unhealthy("memory-credit-store", 0, "marked unavailable")
        } else {
            HealthCheckResult::healthy("memory-credit-store", 0)
        }
    }
}

fn newest_first(mut entries: Vec<CreditEntry>) -> Vec<CreditEntry> {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    entries
}

#[async_trait]
impl CreditStore for InMemoryCreditStore {
    async fn insert_entry(&self, entry: &CreditEntry) -> Result<(), PortError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.entries.contains_key(&entry.id) {
            return Err(PortError::conflict(format!("credit entry {} exists", entry.id)));
        }
        tables.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_entry(&self, id: CreditEntryId) -> Result<CreditEntry, PortError> {
        self.check_available()?;
        self.tables
            .read()
            .await
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("CreditEntry", id))
    }

    async fn mark_settled(
        &self,
        id: CreditEntryId,
        settled_at: DateTime<Utc>,
    ) -> Result<CreditEntry, PortError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let entry = tables
            .entries
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("CreditEntry", id))?;
        if entry.status != CreditStatus::Due {
            return Err(PortError::conflict(format!("credit entry {id} is not due")));
        }
        entry.status = CreditStatus::Settled;
        entry.settled_at = Some(settled_at);
        Ok(entry.clone())
    }

    async fn due_entries(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<CreditEntry>, PortError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.customer_id == customer_id && e.shop_id == shop_id && e.is_due())
            .cloned()
            .collect())
    }

    async fn entries_created_between(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CreditEntry>, PortError> {
        self.check_available()?;
        let mut entries: Vec<CreditEntry> = self
            .tables
            .read()
            .await
            .entries
            .values()
            .filter(|e| {
                e.customer_id == customer_id
                    && e.shop_id == shop_id
                    && e.created_at >= from
                    && e.created_at < until
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn customer_entries(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<CreditEntry>, PortError> {
        self.check_available()?;
        let entries = self
            .tables
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.customer_id == customer_id && e.shop_id == shop_id)
            .cloned()
            .collect();
        Ok(newest_first(entries))
    }

    async fn shop_entries(
        &self,
        shop_id: ShopId,
        status: Option<CreditStatus>,
    ) -> Result<Vec<CreditEntry>, PortError> {
        self.check_available()?;
        let entries = self
            .tables
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.shop_id == shop_id && status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        Ok(newest_first(entries))
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let clash = tables.invoices.values().any(|existing| {
            existing.invoice_number == invoice.invoice_number
                || (existing.customer_id == invoice.customer_id
                    && existing.shop_id == invoice.shop_id
                    && existing.period == invoice.period)
        });
        if clash {
            return Err(PortError::conflict(format!(
                "invoice for {} at {} in {} exists",
                invoice.customer_id, invoice.shop_id, invoice.period
            )));
        }
        tables.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        self.check_available()?;
        self.tables
            .read()
            .await
            .invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Invoice", id))
    }

    async fn find_invoice_for_period(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        period: CalendarMonth,
    ) -> Result<Option<Invoice>, PortError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .invoices
            .values()
            .find(|i| i.customer_id == customer_id && i.shop_id == shop_id && i.period == period)
            .cloned())
    }

    async fn mark_invoice_sent(
        &self,
        id: InvoiceId,
        sent_at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let invoice = tables
            .invoices
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Invoice", id))?;
        invoice.mark_sent(sent_at);
        Ok(())
    }

    async fn customer_invoices(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<Invoice>, PortError> {
        self.check_available()?;
        let mut invoices: Vec<Invoice> = self
            .tables
            .read()
            .await
            .invoices
            .values()
            .filter(|i| i.customer_id == customer_id && i.shop_id == shop_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.period.cmp(&a.period));
        Ok(invoices)
    }
}

/// In-memory customer contact book
#[derive(Debug, Default)]
pub struct InMemoryCustomerDirectory {
    contacts: RwLock<HashMap<CustomerId, CustomerContact>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, contact: CustomerContact) {
        self.contacts.write().await.insert(contact.customer_id, contact);
    }
}

impl DomainPort for InMemoryCustomerDirectory {}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn contact(&self, customer_id: CustomerId) -> Result<Option<CustomerContact>, PortError> {
        Ok(self.contacts.read().await.get(&customer_id).cloned())
    }
}

/// A message captured by `OutboxNotificationSender`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Email {
        address: String,
        subject: String,
        body: String,
    },
    Text {
        phone_number: String,
        body: String,
    },
}

impl OutboundMessage {
    pub fn body(&self) -> &str {
        match self {
            OutboundMessage::Email { body, .. } | OutboundMessage::Text { body, .. } => body,
        }
    }
}

/// Notification sender that records messages instead of delivering them
#[derive(Debug, Default)]
pub struct OutboxNotificationSender {
    outbox: RwLock<Vec<OutboundMessage>>,
    fail_email: AtomicBool,
    fail_message: AtomicBool,
    delay_ms: AtomicU64,
}

impl OutboxNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_email(&self, fail: bool) {
        self.fail_email.store(fail, Ordering::SeqCst);
    }

    pub fn fail_message(&self, fail: bool) {
        self.fail_message.store(fail, Ordering::SeqCst);
    }

    /// Delays every send, for exercising notification timeouts
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.outbox.read().await.clone()
    }

    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

impl DomainPort for OutboxNotificationSender {}

#[async_trait]
impl NotificationSender for OutboxNotificationSender {
    async fn send_email(&self, address: &str, subject: &str, body: &str) -> bool {
        self.pause().await;
        if self.fail_email.load(Ordering::SeqCst) {
            return false;
        }
        self.outbox.write().await.push(OutboundMessage::Email {
            address: address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        true
    }

    async fn send_message(&self, phone_number: &str, body: &str) -> bool {
        self.pause().await;
        if self.fail_message.load(Ordering::SeqCst) {
            return false;
        }
        self.outbox.write().await.push(OutboundMessage::Text {
            phone_number: phone_number.to_string(),
            body: body.to_string(),
        });
        true
    }
}
