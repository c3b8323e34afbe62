//! Monthly credit invoices
//!
//! An invoice snapshots every credit entry a customer opened at a shop during
//! one calendar month. Line items are copies, so settling or correcting an
//! entry later never changes an issued invoice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    CalendarMonth, CreditEntryId, Currency, CustomerId, InvoiceId, InvoiceLineItemId, Money,
    MoneyError, ShopId,
};

use crate::entry::CreditEntry;
use crate::notification::Notice;

/// A monthly invoice for one (customer, shop) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human-readable, globally unique number, e.g. `INV-20250401-0A1B2C3D4E`
    pub invoice_number: String,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub period: CalendarMonth,
    /// Sum of the item amounts, fixed at creation
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Vec<InvoiceLineItem>,
}

impl Invoice {
    /// Builds an invoice from the entries of one billing period
    ///
    /// Items keep the order of `entries`; callers pass them oldest first.
    pub fn from_entries(
        customer_id: CustomerId,
        shop_id: ShopId,
        period: CalendarMonth,
        currency: Currency,
        entries: &[CreditEntry],
        created_at: DateTime<Utc>,
    ) -> Result<Self, MoneyError> {
        let id = InvoiceId::new_v7();
        let items: Vec<InvoiceLineItem> = entries
            .iter()
            .map(|entry| InvoiceLineItem::snapshot(id, entry))
            .collect();
        let total = Money::sum(currency, items.iter().map(|item| &item.amount))?;

        Ok(Self {
            id,
            invoice_number: invoice_number(id, created_at),
            customer_id,
            shop_id,
            period,
            total,
            created_at,
            sent: false,
            sent_at: None,
            notes: None,
            items,
        })
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.sent = true;
        self.sent_at = Some(at);
    }

    /// The message delivered to the customer for this invoice
    pub fn notice(&self) -> Notice {
        Notice::new(
            "Monthly Credit Invoice",
            format!(
                "Monthly Credit Invoice\nInvoice #: {}\nPeriod: {}\nTotal Amount: {}\nItems: {}",
                self.invoice_number,
                self.period,
                self.total,
                self.item_count()
            ),
        )
    }
}

/// A line item copied from a credit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: InvoiceLineItemId,
    pub invoice_id: InvoiceId,
    pub source_entry_id: CreditEntryId,
    pub amount: Money,
    pub description: String,
    /// Creation time of the source entry
    pub entry_date: DateTime<Utc>,
}

impl InvoiceLineItem {
    pub fn snapshot(invoice_id: InvoiceId, entry: &CreditEntry) -> Self {
        Self {
            id: InvoiceLineItemId::new_v7(),
            invoice_id,
            source_entry_id: entry.id,
            amount: entry.amount,
            description: entry.description.clone(),
            entry_date: entry.created_at,
        }
    }
}

/// Result of attempting to deliver an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvoiceDelivery {
    /// At least one channel accepted the message
    Sent { sent_at: DateTime<Utc> },
    /// No channel succeeded; the invoice stays unsent
    NotDelivered,
}

impl InvoiceDelivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, InvoiceDelivery::Sent { .. })
    }
}

/// Formats the invoice number from the creation date and the invoice id
///
/// The suffix is the random tail of the v7 id, so numbers created in the
/// same second still differ.
pub fn invoice_number(id: InvoiceId, created_at: DateTime<Utc>) -> String {
    let hex = id.as_uuid().simple().to_string();
    let suffix = &hex[hex.len() - 10..];
    format!(
        "INV-{}-{}",
        created_at.format("%Y%m%d"),
        suffix.to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::OpenCredit;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn entries(amounts: &[rust_decimal::Decimal]) -> (CustomerId, ShopId, Vec<CreditEntry>) {
        let customer = CustomerId::new();
        let shop = ShopId::new();
        let created = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let list = amounts
            .iter()
            .map(|a| {
                CreditEntry::open(
                    OpenCredit::purchase(customer, shop, Money::new(*a, Currency::BDT), "Groceries"),
                    created,
                )
            })
            .collect();
        (customer, shop, list)
    }

    #[test]
    fn test_invoice_total_is_sum_of_items() {
        let (customer, shop, list) = entries(&[dec!(200), dec!(300)]);
        let period = CalendarMonth::new(2025, 3).unwrap();
        let invoice =
            Invoice::from_entries(customer, shop, period, Currency::BDT, &list, Utc::now()).unwrap();

        assert_eq!(invoice.total, Money::new(dec!(500), Currency::BDT));
        assert_eq!(invoice.item_count(), 2);
        assert!(!invoice.sent);
        assert!(invoice.items.iter().all(|i| i.invoice_id == invoice.id));
    }

    #[test]
    fn test_empty_period_gives_zero_total() {
        let period = CalendarMonth::new(2025, 3).unwrap();
        let invoice = Invoice::from_entries(
            CustomerId::new(),
            ShopId::new(),
            period,
            Currency::BDT,
            &[],
            Utc::now(),
        )
        .unwrap();
        assert!(invoice.total.is_zero());
        assert_eq!(invoice.item_count(), 0);
    }

    #[test]
    fn test_invoice_number_format() {
        let created = Utc.with_ymd_and_hms(2025, 4, 1, 8, 30, 0).unwrap();
        let number = invoice_number(InvoiceId::new_v7(), created);
        assert!(number.starts_with("INV-20250401-"));
        assert_eq!(number.len(), "INV-20250401-".len() + 10);
    }

    #[test]
    fn test_notice_mentions_period_and_count() {
        let (customer, shop, list) = entries(&[dec!(200), dec!(300)]);
        let period = CalendarMonth::new(2025, 3).unwrap();
        let invoice =
            Invoice::from_entries(customer, shop, period, Currency::BDT, &list, Utc::now()).unwrap();
        let notice = invoice.notice();

        assert!(notice.body.contains(&invoice.invoice_number));
        assert!(notice.body.contains("Period: 3/2025"));
        assert!(notice.body.contains("Items: 2"));
        assert!(notice.body.contains("500.00"));
    }
}
