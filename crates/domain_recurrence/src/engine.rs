//! Recurrence engine
//!
//! Turns due recurring obligations into pending occurrences. Each obligation
//! is handled in its own unit of work: the occurrence insert and the
//! schedule advance commit together, so a crash or failure in between
//! leaves the obligation due and the next tick retries it.
//!
//! Catch-up is deliberately coarse. An obligation that missed several due
//! dates gets one occurrence for the oldest missed date, and its schedule
//! jumps to the first date after the tick date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{Clock, ObligationId, OccurrenceId, PortError, ShopId, Timezone};

use crate::cadence::NextDue;
use crate::error::RecurrenceError;
use crate::obligation::{ObligationDraft, RecurringObligation};
use crate::observer::RecurrenceObserver;
use crate::occurrence::{MaterializedOccurrence, OccurrenceDraft};
use crate::ports::{ObligationStore, ObligationUnitOfWork};

/// Days between an occurrence's due date and its pay-by date
pub const DEFAULT_GRACE_DAYS: u32 = 7;

/// Engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub grace_days: u32,
    /// Zone whose calendar decides what "today" is for `tick`
    pub timezone: Timezone,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            grace_days: DEFAULT_GRACE_DAYS,
            timezone: Timezone::default(),
        }
    }
}

/// One obligation that could not be materialized this tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMaterialization {
    pub obligation_id: ObligationId,
    pub due_date: NaiveDate,
    pub error: String,
    pub transient: bool,
}

impl FailedMaterialization {
    fn from_error(error: &RecurrenceError, obligation_id: ObligationId, due_date: NaiveDate) -> Self {
        Self {
            obligation_id,
            due_date,
            error: error.to_string(),
            transient: error.is_transient(),
        }
    }
}

/// Outcome of one materialization tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub as_of: NaiveDate,
    /// Occurrences created this tick
    pub materialized: Vec<OccurrenceId>,
    /// Obligations whose occurrence already existed; only the schedule advanced
    pub already_present: Vec<ObligationId>,
    /// Obligations changed by another writer; rolled back, retried next tick
    pub conflicted: Vec<ObligationId>,
    pub failed: Vec<FailedMaterialization>,
}

impl TickReport {
    fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            materialized: Vec::new(),
            already_present: Vec::new(),
            conflicted: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Obligations the tick touched, whatever the outcome
    pub fn processed(&self) -> usize {
        self.materialized.len() + self.already_present.len() + self.conflicted.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.conflicted.is_empty()
    }
}

enum Outcome {
    Materialized(MaterializedOccurrence),
    AlreadyPresent,
}

/// Materializes recurring obligations and manages their lifecycle
#[derive(Clone)]
pub struct RecurrenceEngine {
    store: Arc<dyn ObligationStore>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn RecurrenceObserver>,
    settings: EngineSettings,
}

impl RecurrenceEngine {
    pub fn new(
        store: Arc<dyn ObligationStore>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn RecurrenceObserver>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            clock,
            observer,
            settings,
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn observer(&self) -> Arc<dyn RecurrenceObserver> {
        self.observer.clone()
    }

    /// Today in the engine's timezone
    pub fn today(&self) -> NaiveDate {
        self.clock.today_in(&self.settings.timezone)
    }

    /// Materializes everything due as of today
    pub async fn tick(&self) -> Result<TickReport, RecurrenceError> {
        self.materialize_due(self.today()).await
    }

    /// Materializes every obligation due on or before `as_of`
    ///
    /// Fails as a whole only when the due obligations cannot be read.
    /// Per-obligation failures are rolled back and listed in the report.
    #[instrument(skip_all, fields(as_of = %as_of))]
    pub async fn materialize_due(&self, as_of: NaiveDate) -> Result<TickReport, RecurrenceError> {
        let due = self.store.due_obligations(as_of).await?;
        self.observer.tick_started(as_of, due.len());

        let mut report = TickReport::new(as_of);
        for obligation in &due {
            let Some(due_date) = obligation.next_due.date() else {
                continue;
            };

            match self.materialize_one(obligation, due_date, as_of).await {
                Ok(Outcome::Materialized(occurrence)) => {
                    self.observer.materialized(&occurrence);
                    report.materialized.push(occurrence.id);
                }
                Ok(Outcome::AlreadyPresent) => {
                    self.observer.already_present(obligation.id, due_date);
                    report.already_present.push(obligation.id);
                }
                Err(e) if e.is_conflict() => {
                    self.observer.conflicted(obligation.id, due_date);
                    report.conflicted.push(obligation.id);
                }
                Err(source) => {
                    let failure = RecurrenceError::Materialization {
                        obligation_id: obligation.id,
                        due_date,
                        source,
                    };
                    self.observer.obligation_failed(&failure);
                    report.failed.push(FailedMaterialization::from_error(&failure, obligation.id, due_date));
                }
            }
        }

        self.observer.tick_completed(&report);
        Ok(report)
    }

    async fn materialize_one(
        &self,
        obligation: &RecurringObligation,
        due_date: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<Outcome, PortError> {
        let mut uow = self.store.begin().await?;
        match self.stage(uow.as_mut(), obligation, due_date, as_of).await {
            Ok(outcome) => {
                uow.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = uow.rollback().await {
                    warn!(obligation_id = %obligation.id, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn stage(
        &self,
        uow: &mut dyn ObligationUnitOfWork,
        obligation: &RecurringObligation,
        due_date: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<Outcome, PortError> {
        let now = self.clock.now();
        let outcome = if uow.occurrence_exists(obligation.id, due_date).await? {
            Outcome::AlreadyPresent
        } else {
            let occurrence =
                MaterializedOccurrence::from_obligation(obligation, due_date, self.settings.grace_days, now);
            uow.insert_occurrence(&occurrence).await?;
            Outcome::Materialized(occurrence)
        };

        uow.advance_schedule(
            obligation.id,
            obligation.next_due,
            due_date,
            obligation.rule.next_after(as_of),
            now,
        )
        .await?;
        Ok(outcome)
    }

    /// Creates an obligation, or edits one when the draft carries an id
    #[instrument(skip_all, fields(shop_id = %draft.shop_id))]
    pub async fn upsert_obligation(&self, draft: ObligationDraft) -> Result<RecurringObligation, RecurrenceError> {
        let rule = draft.check()?;
        let now = self.clock.now();

        let obligation = match draft.id {
            Some(id) => {
                let existing = self.load_obligation(id).await?;
                draft.apply_to(&existing, rule, now)
            }
            None => draft.into_obligation(rule, now),
        };
        self.store.save_obligation(&obligation).await?;
        info!(obligation_id = %obligation.id, next_due = %obligation.next_due, "Obligation saved");
        Ok(obligation)
    }

    /// Flips the active flag; the schedule is left as is
    #[instrument(skip(self), fields(obligation_id = %id))]
    pub async fn toggle_obligation(&self, id: ObligationId) -> Result<RecurringObligation, RecurrenceError> {
        let mut obligation = self.load_obligation(id).await?;
        obligation.active = !obligation.active;
        obligation.updated_at = self.clock.now();
        self.store.save_obligation(&obligation).await?;
        info!(active = obligation.active, "Obligation toggled");
        Ok(obligation)
    }

    pub async fn get_obligation(&self, id: ObligationId) -> Result<RecurringObligation, RecurrenceError> {
        self.load_obligation(id).await
    }

    pub async fn shop_obligations(&self, shop_id: ShopId) -> Result<Vec<RecurringObligation>, RecurrenceError> {
        Ok(self.store.shop_obligations(shop_id).await?)
    }

    /// Records a one-off expense entered by shop staff
    #[instrument(skip_all, fields(shop_id = %draft.shop_id))]
    pub async fn record_occurrence(&self, draft: OccurrenceDraft) -> Result<MaterializedOccurrence, RecurrenceError> {
        let occurrence = draft.into_occurrence(self.clock.now())?;
        self.store.insert_occurrence(&occurrence).await?;
        info!(occurrence_id = %occurrence.id, due_date = %occurrence.due_date, "Expense recorded");
        Ok(occurrence)
    }

    /// # Errors
    ///
    /// * `OccurrenceNotFound` when the id is unknown
    /// * `AlreadyPaid` when it was paid before, including by a concurrent caller
    #[instrument(skip(self), fields(occurrence_id = %id))]
    pub async fn mark_occurrence_paid(&self, id: OccurrenceId) -> Result<MaterializedOccurrence, RecurrenceError> {
        let current = self.get_occurrence(id).await?;
        let mut paid = current.clone();
        let now = self.clock.now();
        paid.mark_paid(now)?;

        match self.store.mark_occurrence_paid(id, now).await {
            Ok(stored) => {
                info!("Occurrence paid");
                Ok(stored)
            }
            Err(e) if e.is_conflict() => Err(RecurrenceError::AlreadyPaid(id)),
            Err(e) if e.is_not_found() => Err(RecurrenceError::OccurrenceNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_occurrence(&self, id: OccurrenceId) -> Result<MaterializedOccurrence, RecurrenceError> {
        self.store.get_occurrence(id).await.map_err(|e| {
            if e.is_not_found() {
                RecurrenceError::OccurrenceNotFound(id)
            } else {
                e.into()
            }
        })
    }

    /// Latest due date first
    pub async fn shop_occurrences(&self, shop_id: ShopId) -> Result<Vec<MaterializedOccurrence>, RecurrenceError> {
        Ok(self.store.shop_occurrences(shop_id).await?)
    }

    /// Earliest due date first
    pub async fn obligation_occurrences(
        &self,
        obligation_id: ObligationId,
    ) -> Result<Vec<MaterializedOccurrence>, RecurrenceError> {
        Ok(self.store.obligation_occurrences(obligation_id).await?)
    }

    async fn load_obligation(&self, id: ObligationId) -> Result<RecurringObligation, RecurrenceError> {
        self.store.get_obligation(id).await.map_err(|e| {
            if e.is_not_found() {
                RecurrenceError::ObligationNotFound(id)
            } else {
                e.into()
            }
        })
    }
}

impl std::fmt::Debug for RecurrenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurrenceEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryObligationStore;
    use crate::observer::TracingObserver;
    use core_kernel::{Currency, ExpenseCategoryId, FixedClock, Money};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine(store: Arc<InMemoryObligationStore>, today: NaiveDate) -> RecurrenceEngine {
        RecurrenceEngine::new(
            store,
            Arc::new(FixedClock::at_date(today)),
            Arc::new(TracingObserver),
            EngineSettings::default(),
        )
    }

    fn draft(start: NaiveDate) -> ObligationDraft {
        ObligationDraft::monthly(
            ShopId::new(),
            ExpenseCategoryId::new(),
            "Internet",
            Money::new(dec!(1200), Currency::BDT),
            start,
        )
    }

    #[tokio::test]
    async fn test_edit_unknown_obligation() {
        let engine = engine(Arc::new(InMemoryObligationStore::new()), date(2025, 1, 1));
        let mut edit = draft(date(2025, 1, 1));
        let id = ObligationId::new();
        edit.id = Some(id);
        assert!(matches!(
            engine.upsert_obligation(edit).await,
            Err(RecurrenceError::ObligationNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_toggle_keeps_schedule() {
        let engine = engine(Arc::new(InMemoryObligationStore::new()), date(2025, 1, 1));
        let created = engine.upsert_obligation(draft(date(2025, 1, 10))).await.unwrap();

        let paused = engine.toggle_obligation(created.id).await.unwrap();
        assert!(!paused.active);
        assert_eq!(paused.next_due, created.next_due);

        let resumed = engine.toggle_obligation(created.id).await.unwrap();
        assert!(resumed.active);
        assert_eq!(resumed.next_due, NextDue::Scheduled(date(2025, 1, 10)));
    }

    #[tokio::test]
    async fn test_inactive_obligation_not_materialized() {
        let store = Arc::new(InMemoryObligationStore::new());
        let engine = engine(store.clone(), date(2025, 1, 20));
        let created = engine.upsert_obligation(draft(date(2025, 1, 10))).await.unwrap();
        engine.toggle_obligation(created.id).await.unwrap();

        let report = engine.tick().await.unwrap();
        assert_eq!(report.processed(), 0);
        assert_eq!(store.occurrence_count().await, 0);
    }

    #[tokio::test]
    async fn test_pay_unknown_occurrence() {
        let engine = engine(Arc::new(InMemoryObligationStore::new()), date(2025, 1, 1));
        assert!(matches!(
            engine.mark_occurrence_paid(OccurrenceId::new()).await,
            Err(RecurrenceError::OccurrenceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_store_fails_tick() {
        let store = Arc::new(InMemoryObligationStore::new());
        let engine = engine(store.clone(), date(2025, 1, 1));
        store.set_unavailable(true);
        let err = engine.tick().await.unwrap_err();
        assert!(err.is_transient());
    }
}
