//! Credit Ledger Domain
//!
//! This crate records store credit ("baki") that customers owe to shops and
//! rolls each calendar month of credit into an invoice.
//!
//! # Flow
//!
//! - A POS or shop counter calls [`CreditLedger::open`] to put a purchase on
//!   the customer's tab; [`CreditLedger::settle`] closes an entry when paid.
//! - Once a month closes, [`InvoiceAggregator::generate_monthly_invoice`]
//!   snapshots every entry of that month into an [`Invoice`], and
//!   [`InvoiceAggregator::send_invoice`] delivers it.
//!
//! Both services persist through the [`CreditStore`] port and notify the
//! customer through [`CustomerNotifier`].
//!
//! # Example
//!
//! ```rust
//! use domain_credit::{CreditLedger, CustomerNotifier, OpenCredit};
//! use domain_credit::memory::{InMemoryCreditStore, InMemoryCustomerDirectory, OutboxNotificationSender};
//! use core_kernel::{Currency, CustomerId, Money, ShopId, SystemClock};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let notifier = CustomerNotifier::new(
//!     Arc::new(InMemoryCustomerDirectory::new()),
//!     Arc::new(OutboxNotificationSender::new()),
//!     Duration::from_secs(5),
//! );
//! let ledger = CreditLedger::new(
//!     Arc::new(InMemoryCreditStore::new()),
//!     notifier,
//!     Arc::new(SystemClock),
//!     Currency::BDT,
//! );
//!
//! let (customer, shop) = (CustomerId::new(), ShopId::new());
//! let entry = ledger
//!     .open(OpenCredit::purchase(customer, shop, Money::new(dec!(500), Currency::BDT), "Rice"))
//!     .await
//!     .unwrap();
//! ledger.settle(entry.id).await.unwrap();
//! assert!(ledger.outstanding_balance(customer, shop).await.unwrap().is_zero());
//! # });
//! # }
//! ```

pub mod entry;
pub mod invoice;
pub mod notification;
pub mod ports;
pub mod memory;
pub mod ledger;
pub mod aggregator;
pub mod error;

pub use entry::{CreditEntry, CreditKind, CreditStatus, OpenCredit};
pub use invoice::{Invoice, InvoiceDelivery, InvoiceLineItem};
pub use notification::{
    ChannelOutcome, CustomerContact, CustomerDirectory, CustomerNotifier, DeliveryReport, Notice,
    NotificationSender,
};
pub use ports::CreditStore;
pub use ledger::CreditLedger;
pub use aggregator::InvoiceAggregator;
pub use error::CreditError;
