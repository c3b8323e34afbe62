//! Integration tests for the credit ledger and invoice aggregator

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{Clock, CreditEntryId, Currency, CustomerId, FixedClock, InvoiceId, Money, ShopId, Timezone};

use domain_credit::memory::{
    InMemoryCreditStore, InMemoryCustomerDirectory, OutboundMessage, OutboxNotificationSender,
};
use domain_credit::{
    CreditError, CreditLedger, CreditStatus, CustomerContact, CustomerNotifier, InvoiceAggregator,
    InvoiceDelivery, OpenCredit,
};

struct Harness {
    ledger: CreditLedger,
    aggregator: InvoiceAggregator,
    store: Arc<InMemoryCreditStore>,
    directory: Arc<InMemoryCustomerDirectory>,
    sender: Arc<OutboxNotificationSender>,
    clock: Arc<FixedClock>,
}

impl Harness {
    fn new(timezone: &str) -> Self {
        let store = Arc::new(InMemoryCreditStore::new());
        let directory = Arc::new(InMemoryCustomerDirectory::new());
        let sender = Arc::new(OutboxNotificationSender::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap()));
        let notifier = CustomerNotifier::new(directory.clone(), sender.clone(), Duration::from_secs(5));
        let tz: Timezone = timezone.parse().unwrap();

        Self {
            ledger: CreditLedger::new(store.clone(), notifier.clone(), clock.clone(), Currency::BDT),
            aggregator: InvoiceAggregator::new(store.clone(), notifier, clock.clone(), Currency::BDT, tz),
            store,
            directory,
            sender,
            clock,
        }
    }

    async fn register(&self, customer_id: CustomerId, email: Option<&str>, phone: Option<&str>) {
        self.directory
            .insert(CustomerContact {
                customer_id,
                full_name: "Karim Hossain".to_string(),
                email: email.map(str::to_string),
                phone_number: phone.map(str::to_string),
            })
            .await;
    }

    async fn open_at(
        &self,
        customer: CustomerId,
        shop: ShopId,
        amount: Decimal,
        at: chrono::DateTime<Utc>,
    ) -> CreditEntryId {
        self.clock.set(at);
        self.ledger
            .open(OpenCredit::purchase(customer, shop, bdt(amount), "Groceries"))
            .await
            .unwrap()
            .id
    }
}

fn bdt(amount: Decimal) -> Money {
    Money::new(amount, Currency::BDT)
}

// ============================================================================
// Credit Ledger
// ============================================================================

mod ledger_tests {
    use super::*;

    #[tokio::test]
    async fn test_open_settle_then_balance_is_zero() {
        let h = Harness::new("UTC");
        let (customer, shop) = (CustomerId::new(), ShopId::new());

        let entry = h
            .ledger
            .open(OpenCredit::purchase(customer, shop, bdt(dec!(500)), "Rice 10kg"))
            .await
            .unwrap();
        assert_eq!(entry.status, CreditStatus::Due);
        assert_eq!(h.ledger.outstanding_balance(customer, shop).await.unwrap(), bdt(dec!(500)));

        let settled = h.ledger.settle(entry.id).await.unwrap();
        assert_eq!(settled.status, CreditStatus::Settled);
        let settled_at = settled.settled_at.unwrap();

        assert!(h.ledger.outstanding_balance(customer, shop).await.unwrap().is_zero());

        h.clock.advance(chrono::Duration::hours(2));
        let again = h.ledger.settle(entry.id).await;
        assert!(matches!(again, Err(CreditError::AlreadySettled(id)) if id == entry.id));

        let stored = h.ledger.get_entry(entry.id).await.unwrap();
        assert_eq!(stored.settled_at, Some(settled_at));
    }

    #[tokio::test]
    async fn test_balance_only_counts_the_pair() {
        let h = Harness::new("UTC");
        let (customer, shop, other_shop) = (CustomerId::new(), ShopId::new(), ShopId::new());
        let at = h.clock.now();

        h.open_at(customer, shop, dec!(120), at).await;
        h.open_at(customer, shop, dec!(80), at).await;
        h.open_at(customer, other_shop, dec!(999), at).await;

        assert_eq!(h.ledger.outstanding_balance(customer, shop).await.unwrap(), bdt(dec!(200)));
        assert_eq!(h.ledger.shop_entries(other_shop, Some(CreditStatus::Due)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_customer_entries_are_newest_first() {
        let h = Harness::new("UTC");
        let (customer, shop) = (CustomerId::new(), ShopId::new());

        let older = h.open_at(customer, shop, dec!(10), Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()).await;
        let newer = h.open_at(customer, shop, dec!(20), Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap()).await;

        let entries = h.ledger.customer_entries(customer, shop).await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_entry() {
        let h = Harness::new("UTC");
        let customer = CustomerId::new();
        h.register(customer, Some("karim@example.com"), Some("+8801711111111")).await;
        h.sender.fail_email(true);
        h.sender.fail_message(true);

        let entry = h
            .ledger
            .open(OpenCredit::purchase(customer, ShopId::new(), bdt(dec!(75)), "Oil"))
            .await
            .unwrap();

        assert_eq!(h.store.entry_count().await, 1);
        assert!(h.ledger.get_entry(entry.id).await.unwrap().is_due());
    }

    #[tokio::test]
    async fn test_open_and_settle_notify_customer() {
        let h = Harness::new("UTC");
        let customer = CustomerId::new();
        h.register(customer, None, Some("+8801711111111")).await;

        let entry = h
            .ledger
            .open(OpenCredit::purchase(customer, ShopId::new(), bdt(dec!(500)), "Rice"))
            .await
            .unwrap();
        h.ledger.settle(entry.id).await.unwrap();

        let sent = h.sender.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent[0].body().contains("Description: Rice"));
        assert!(sent[1].body().starts_with("Credit entry settled"));
    }
}

// ============================================================================
// Invoice Aggregator
// ============================================================================

mod invoice_tests {
    use super::*;

    #[tokio::test]
    async fn test_march_invoice_totals_both_entries() {
        let h = Harness::new("UTC");
        let (customer, shop) = (CustomerId::new(), ShopId::new());

        h.open_at(customer, shop, dec!(200), Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()).await;
        h.open_at(customer, shop, dec!(300), Utc.with_ymd_and_hms(2025, 3, 28, 18, 0, 0).unwrap()).await;
        h.open_at(customer, shop, dec!(50), Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()).await;
        h.open_at(customer, shop, dec!(40), Utc.with_ymd_and_hms(2025, 2, 28, 23, 59, 59).unwrap()).await;

        let invoice = h
            .aggregator
            .generate_monthly_invoice(customer, shop, 3, 2025)
            .await
            .unwrap();

        assert_eq!(invoice.total, bdt(dec!(500)));
        assert_eq!(invoice.item_count(), 2);
        assert_eq!(invoice.items[0].amount, bdt(dec!(200)));
        assert_eq!(invoice.items[1].amount, bdt(dec!(300)));
    }

    #[tokio::test]
    async fn test_month_boundaries_follow_shop_timezone() {
        let h = Harness::new("Asia/Dhaka");
        let (customer, shop) = (CustomerId::new(), ShopId::new());

        // 01:00 on 1 March in Dhaka
        h.open_at(customer, shop, dec!(100), Utc.with_ymd_and_hms(2025, 2, 28, 19, 0, 0).unwrap()).await;
        // 01:00 on 1 April in Dhaka
        h.open_at(customer, shop, dec!(900), Utc.with_ymd_and_hms(2025, 3, 31, 19, 0, 0).unwrap()).await;

        let invoice = h
            .aggregator
            .generate_monthly_invoice(customer, shop, 3, 2025)
            .await
            .unwrap();
        assert_eq!(invoice.total, bdt(dec!(100)));
    }

    #[tokio::test]
    async fn test_settled_entries_are_included() {
        let h = Harness::new("UTC");
        let (customer, shop) = (CustomerId::new(), ShopId::new());
        let id = h.open_at(customer, shop, dec!(250), Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()).await;
        h.ledger.settle(id).await.unwrap();

        let invoice = h
            .aggregator
            .generate_monthly_invoice(customer, shop, 3, 2025)
            .await
            .unwrap();
        assert_eq!(invoice.items[0].source_entry_id, id);
        assert_eq!(invoice.total, bdt(dec!(250)));
    }

    #[tokio::test]
    async fn test_second_invoice_for_same_month_rejected() {
        let h = Harness::new("UTC");
        let (customer, shop) = (CustomerId::new(), ShopId::new());
        h.open_at(customer, shop, dec!(10), Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()).await;

        h.aggregator.generate_monthly_invoice(customer, shop, 3, 2025).await.unwrap();
        let second = h.aggregator.generate_monthly_invoice(customer, shop, 3, 2025).await;

        assert!(matches!(second, Err(CreditError::DuplicateInvoice { .. })));
        assert_eq!(h.store.invoice_count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_month_rejected() {
        let h = Harness::new("UTC");
        let result = h
            .aggregator
            .generate_monthly_invoice(CustomerId::new(), ShopId::new(), 13, 2025)
            .await;
        assert!(matches!(result, Err(CreditError::InvalidPeriod { month: 13, year: 2025 })));
    }

    #[tokio::test]
    async fn test_send_marks_invoice_sent() {
        let h = Harness::new("UTC");
        let (customer, shop) = (CustomerId::new(), ShopId::new());
        h.register(customer, Some("karim@example.com"), None).await;
        h.open_at(customer, shop, dec!(200), Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()).await;
        let invoice = h.aggregator.generate_monthly_invoice(customer, shop, 3, 2025).await.unwrap();

        let delivery = h.aggregator.send_invoice(invoice.id).await.unwrap();
        assert!(delivery.is_sent());

        let stored = h.aggregator.get_invoice(invoice.id).await.unwrap();
        assert!(stored.sent);
        assert!(stored.sent_at.is_some());

        let mail = h.sender.sent().await.into_iter().last().unwrap();
        match mail {
            OutboundMessage::Email { subject, body, .. } => {
                assert_eq!(subject, "Monthly Credit Invoice");
                assert!(body.contains(&invoice.invoice_number));
                assert!(body.contains("Period: 3/2025"));
                assert!(body.contains("Items: 1"));
            }
            other => panic!("expected email, got {other:?}"),
        }

        // re-sending is allowed
        assert!(h.aggregator.send_invoice(invoice.id).await.unwrap().is_sent());
    }

    #[tokio::test]
    async fn test_send_without_channels_leaves_invoice_unsent() {
        let h = Harness::new("UTC");
        let (customer, shop) = (CustomerId::new(), ShopId::new());
        let invoice = h.aggregator.generate_monthly_invoice(customer, shop, 3, 2025).await.unwrap();

        let delivery = h.aggregator.send_invoice(invoice.id).await.unwrap();
        assert_eq!(delivery, InvoiceDelivery::NotDelivered);
        assert!(!h.aggregator.get_invoice(invoice.id).await.unwrap().sent);
    }

    #[tokio::test]
    async fn test_send_unknown_invoice() {
        let h = Harness::new("UTC");
        let id = InvoiceId::new();
        assert!(matches!(
            h.aggregator.send_invoice(id).await,
            Err(CreditError::InvoiceNotFound(found)) if found == id
        ));
    }
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn invoice_total_equals_sum_of_items(
            minors in proptest::collection::vec(1i64..5_000_000i64, 0..20),
            days in proptest::collection::vec(1u32..=31u32, 20)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let h = Harness::new("UTC");
                let (customer, shop) = (CustomerId::new(), ShopId::new());
                let mut expected = Decimal::ZERO;
                for (minor, day) in minors.iter().zip(days.iter()) {
                    let amount = Money::from_minor(*minor, Currency::BDT);
                    expected += amount.amount();
                    h.open_at(customer, shop, amount.amount(), Utc.with_ymd_and_hms(2025, 3, *day, 12, 0, 0).unwrap()).await;
                }

                let invoice = h.aggregator.generate_monthly_invoice(customer, shop, 3, 2025).await.unwrap();
                let items_total: Decimal = invoice.items.iter().map(|i| i.amount.amount()).sum();
                assert_eq!(invoice.total.amount(), items_total);
                assert_eq!(invoice.total.amount(), expected);
                assert_eq!(invoice.item_count(), minors.len());
            });
        }
    }
}
