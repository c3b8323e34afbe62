//! Recurrence Domain Ports
//!
//! `ObligationStore` persists obligations and occurrences. Materialization
//! goes through an explicit unit of work so that creating an occurrence and
//! advancing the obligation's schedule commit together or not at all:
//!
//! ```rust,ignore
//! let mut uow = store.begin().await?;
//! if !uow.occurrence_exists(id, due).await? {
//!     uow.insert_occurrence(&occurrence).await?;
//! }
//! uow.advance_schedule(id, expected, due, next, now).await?;
//! uow.commit().await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{DomainPort, ObligationId, OccurrenceId, PortError, ShopId};

use crate::cadence::NextDue;
use crate::obligation::RecurringObligation;
use crate::occurrence::MaterializedOccurrence;

/// Storage port for recurring obligations and their occurrences
///
/// Adapters must reject a second occurrence for the same
/// (obligation, due date) with `PortError::Conflict`, both here and inside
/// a unit of work.
#[async_trait]
pub trait ObligationStore: DomainPort {
    /// Active obligations scheduled on or before `as_of` whose end date,
    /// if any, is not before `as_of`
    async fn due_obligations(&self, as_of: NaiveDate) -> Result<Vec<RecurringObligation>, PortError>;

    async fn get_obligation(&self, id: ObligationId) -> Result<RecurringObligation, PortError>;

    /// Inserts or replaces the obligation
    async fn save_obligation(&self, obligation: &RecurringObligation) -> Result<(), PortError>;

    async fn shop_obligations(&self, shop_id: ShopId) -> Result<Vec<RecurringObligation>, PortError>;

    async fn insert_occurrence(&self, occurrence: &MaterializedOccurrence) -> Result<(), PortError>;

    async fn get_occurrence(&self, id: OccurrenceId) -> Result<MaterializedOccurrence, PortError>;

    /// Compare-and-set Pending to Paid; `Conflict` when already paid
    async fn mark_occurrence_paid(
        &self,
        id: OccurrenceId,
        paid_at: DateTime<Utc>,
    ) -> Result<MaterializedOccurrence, PortError>;

    /// Occurrences of a shop, latest due date first
    async fn shop_occurrences(&self, shop_id: ShopId) -> Result<Vec<MaterializedOccurrence>, PortError>;

    /// Occurrences generated from one obligation, earliest due date first
    async fn obligation_occurrences(
        &self,
        obligation_id: ObligationId,
    ) -> Result<Vec<MaterializedOccurrence>, PortError>;

    /// Opens a unit of work for materializing one obligation
    async fn begin(&self) -> Result<Box<dyn ObligationUnitOfWork>, PortError>;
}

/// Transactional scope for one obligation's materialization
///
/// Nothing written through the unit of work is visible to other readers
/// until `commit`. Dropping it without committing discards the writes.
#[async_trait]
pub trait ObligationUnitOfWork: Send {
    async fn occurrence_exists(
        &mut self,
        obligation_id: ObligationId,
        due_date: NaiveDate,
    ) -> Result<bool, PortError>;

    async fn insert_occurrence(&mut self, occurrence: &MaterializedOccurrence) -> Result<(), PortError>;

    /// Moves the schedule forward if `next_due` still equals `expected`
    ///
    /// Returns `Conflict` when another writer advanced it first.
    async fn advance_schedule(
        &mut self,
        obligation_id: ObligationId,
        expected: NextDue,
        last_materialized: NaiveDate,
        next_due: NextDue,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}
