//! Core Kernel - Foundational types shared by the ledger crates
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Calendar months, timezones and an injectable clock
//! - Strongly-typed identifiers
//! - The port error taxonomy implemented by every storage adapter

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{
    CalendarMonth, Clock, FixedClock, SystemClock, TemporalError, Timezone,
    days_in_month,
};
pub use identifiers::{
    IdParseError,
    CustomerId, ShopId, CreditEntryId, InvoiceId, InvoiceLineItemId,
    ObligationId, OccurrenceId, ExpenseCategoryId, PosTransactionId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
