//! Recurring Obligation Domain
//!
//! Recurring obligations ("fixed expenses") such as rent, utilities or
//! salaries are templates with a [`RecurrenceRule`]. The
//! [`RecurrenceEngine`] turns every due date of a template into a payable
//! [`MaterializedOccurrence`], and the [`SchedulerDriver`] runs the engine on
//! a fixed period.
//!
//! # Guarantees
//!
//! - At most one occurrence per (obligation, due date), enforced by the
//!   [`ObligationStore`] and not by timing.
//! - Creating an occurrence and advancing the schedule happen in one
//!   [`ObligationUnitOfWork`]; a failed obligation stays due and is retried.
//! - A series that passes its end date is [`NextDue::Exhausted`].
//!
//! # Example
//!
//! ```rust
//! use domain_recurrence::{EngineSettings, ObligationDraft, RecurrenceEngine, TracingObserver};
//! use domain_recurrence::memory::InMemoryObligationStore;
//! use core_kernel::{Currency, ExpenseCategoryId, FixedClock, Money, ShopId};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let engine = RecurrenceEngine::new(
//!     Arc::new(InMemoryObligationStore::new()),
//!     Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap())),
//!     Arc::new(TracingObserver),
//!     EngineSettings::default(),
//! );
//!
//! let rent = ObligationDraft::monthly(
//!     ShopId::new(),
//!     ExpenseCategoryId::new(),
//!     "Shop rent",
//!     Money::new(dec!(15000), Currency::BDT),
//!     NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//! );
//! engine.upsert_obligation(rent).await.unwrap();
//!
//! let report = engine.tick().await.unwrap();
//! assert_eq!(report.materialized.len(), 1);
//! # });
//! ```

pub mod cadence;
pub mod obligation;
pub mod occurrence;
pub mod ports;
pub mod memory;
pub mod observer;
pub mod engine;
pub mod scheduler;
pub mod error;

pub use cadence::{weekday_from_sunday_index, Cadence, NextDue, RecurrenceRule};
pub use obligation::{ObligationDraft, RecurringObligation};
pub use occurrence::{MaterializedOccurrence, OccurrenceDraft, OccurrenceStatus};
pub use ports::{ObligationStore, ObligationUnitOfWork};
pub use observer::{RecurrenceObserver, TickFailure, TracingObserver};
pub use engine::{EngineSettings, FailedMaterialization, RecurrenceEngine, TickReport, DEFAULT_GRACE_DAYS};
pub use scheduler::{SchedulerConfig, SchedulerDriver, DEFAULT_PERIOD};
pub use error::RecurrenceError;
