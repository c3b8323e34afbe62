//! Repositories
//!
//! Each repository owns the SQL for one group of tables and returns plain
//! row structs. Queries are built at runtime with `sqlx::query_as` so the
//! crate compiles without a live database.

pub mod credit;
pub mod obligation;

pub use credit::{CreditEntryRow, CreditRepository, CustomerRow, InvoiceLineItemRow, InvoiceRow};
pub use obligation::{ObligationRepository, ObligationRow, OccurrenceRow};
