//! Test Utilities Crate
//!
//! Shared test infrastructure for the ledger test suites.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built money, dates, identifiers and contacts
//! - `builders`: Builders for credit requests and obligation drafts
//! - `assertions`: Assertion helpers for money, invoices and schedules
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
