//! In-memory adapter for the obligation store
//!
//! A unit of work takes the store lock for its whole life and writes to a
//! staged copy of the tables, which replaces the live tables on commit.
//! Fault switches let tests fail individual steps of materialization.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, ObligationId, OccurrenceId, PortError, ShopId,
};

use crate::cadence::NextDue;
use crate::obligation::RecurringObligation;
use crate::occurrence::{MaterializedOccurrence, OccurrenceStatus};
use crate::ports::{ObligationStore, ObligationUnitOfWork};

#[derive(Debug, Default, Clone)]
struct Tables {
    obligations: HashMap<ObligationId, RecurringObligation>,
    occurrences: HashMap<OccurrenceId, MaterializedOccurrence>,
}

impl Tables {
    fn has_occurrence(&self, obligation_id: ObligationId, due_date: NaiveDate) -> bool {
        self.occurrences
            .values()
            .any(|o| o.obligation_id == Some(obligation_id) && o.due_date == due_date)
    }

    fn insert_occurrence(&mut self, occurrence: &MaterializedOccurrence) -> Result<(), PortError> {
        if let Some(obligation_id) = occurrence.obligation_id {
            if self.has_occurrence(obligation_id, occurrence.due_date) {
                return Err(PortError::conflict(format!(
                    "occurrence for {obligation_id} on {} exists",
                    occurrence.due_date
                )));
            }
        }
        if self.occurrences.contains_key(&occurrence.id) {
            return Err(PortError::conflict(format!("occurrence {} exists", occurrence.id)));
        }
        self.occurrences.insert(occurrence.id, occurrence.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    panic_on_select: bool,
    fail_insert: HashSet<ObligationId>,
    fail_advance: HashSet<ObligationId>,
}

/// In-memory implementation of `ObligationStore`
#[derive(Debug, Default, Clone)]
pub struct InMemoryObligationStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<std::sync::Mutex<Faults>>,
}

impl InMemoryObligationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every call fails with a connection error while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults().unavailable = unavailable;
    }

    /// Selecting due obligations panics while set
    pub fn set_panic_on_select(&self, panic: bool) {
        self.faults().panic_on_select = panic;
    }

    /// Inserting an occurrence for `id` inside a unit of work fails
    pub fn fail_insert_for(&self, id: ObligationId, fail: bool) {
        let mut faults = self.faults();
        if fail {
            faults.fail_insert.insert(id);
        } else {
            faults.fail_insert.remove(&id);
        }
    }

    /// Advancing the schedule of `id` inside a unit of work fails
    pub fn fail_advance_for(&self, id: ObligationId, fail: bool) {
        let mut faults = self.faults();
        if fail {
            faults.fail_advance.insert(id);
        } else {
            faults.fail_advance.remove(&id);
        }
    }

    /// Writes an occurrence directly, bypassing the engine
    pub async fn seed_occurrence(&self, occurrence: MaterializedOccurrence) {
        self.tables
            .lock()
            .await
            .occurrences
            .insert(occurrence.id, occurrence);
    }

    pub async fn occurrence_count(&self) -> usize {
        self.tables.lock().await.occurrences.len()
    }

    fn check_available(&self) -> Result<(), PortError> {
        if self.faults().unavailable {
            return Err(PortError::connection("in-memory obligation store unavailable"));
        }
        Ok(())
    }
}

impl DomainPort for InMemoryObligationStore {}

#[async_trait]
impl HealthCheckable for InMemoryObligationStore {
    async fn health_check(&self) -> HealthCheckResult {
        match self.check_available() {
            Ok(()) => HealthCheckResult::healthy("memory-obligation-store", 0),
            Err(e) => HealthCheckResult::unhealthy("memory-obligation-store", 0, e.to_string()),
        }
    }
}

#[async_trait]
impl ObligationStore for InMemoryObligationStore {
    async fn due_obligations(&self, as_of: NaiveDate) -> Result<Vec<RecurringObligation>, PortError> {
        self.check_available()?;
        if self.faults().panic_on_select {
            panic!("obligation selection panicked");
        }
        let mut due: Vec<RecurringObligation> = self
            .tables
            .lock()
            .await
            .obligations
            .values()
            .filter(|o| o.is_due(as_of))
            .cloned()
            .collect();
        due.sort_by_key(|o| (o.next_due.date(), o.id));
        Ok(due)
    }

    async fn get_obligation(&self, id: ObligationId) -> Result<RecurringObligation, PortError> {
        self.check_available()?;
        self.tables
            .lock()
            .await
            .obligations
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("RecurringObligation", id))
    }

    async fn save_obligation(&self, obligation: &RecurringObligation) -> Result<(), PortError> {
        self.check_available()?;
        self.tables
            .lock()
            .await
            .obligations
            .insert(obligation.id, obligation.clone());
        Ok(())
    }

    async fn shop_obligations(&self, shop_id: ShopId) -> Result<Vec<RecurringObligation>, PortError> {
        self.check_available()?;
        let mut list: Vec<RecurringObligation> = self
            .tables
            .lock()
            .await
            .obligations
            .values()
            .filter(|o| o.shop_id == shop_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn insert_occurrence(&self, occurrence: &MaterializedOccurrence) -> Result<(), PortError> {
        self.check_available()?;
        self.tables.lock().await.insert_occurrence(occurrence)
    }

    async fn get_occurrence(&self, id: OccurrenceId) -> Result<MaterializedOccurrence, PortError> {
        self.check_available()?;
        self.tables
            .lock()
            .await
            .occurrences
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("MaterializedOccurrence", id))
    }

    async fn mark_occurrence_paid(
        &self,
        id: OccurrenceId,
        paid_at: DateTime<Utc>,
    ) -> Result<MaterializedOccurrence, PortError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let occurrence = tables
            .occurrences
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("MaterializedOccurrence", id))?;
        if occurrence.status == OccurrenceStatus::Paid {
            return Err(PortError::conflict(format!("occurrence {id} already paid")));
        }
        occurrence.status = OccurrenceStatus::Paid;
        occurrence.paid_at = Some(paid_at);
        Ok(occurrence.clone())
    }

    async fn shop_occurrences(&self, shop_id: ShopId) -> Result<Vec<MaterializedOccurrence>, PortError> {
        self.check_available()?;
        let mut list: Vec<MaterializedOccurrence> = self
            .tables
            .lock()
            .await
            .occurrences
            .values()
            .filter(|o| o.shop_id == shop_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.due_date.cmp(&a.due_date).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn obligation_occurrences(
        &self,
        obligation_id: ObligationId,
    ) -> Result<Vec<MaterializedOccurrence>, PortError> {
        self.check_available()?;
        let mut list: Vec<MaterializedOccurrence> = self
            .tables
            .lock()
            .await
            .occurrences
            .values()
            .filter(|o| o.obligation_id == Some(obligation_id))
            .cloned()
            .collect();
        list.sort_by_key(|o| o.due_date);
        Ok(list)
    }

    async fn begin(&self) -> Result<Box<dyn ObligationUnitOfWork>, PortError> {
        self.check_available()?;
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            faults: self.faults.clone(),
        }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    faults: Arc<std::sync::Mutex<Faults>>,
}

impl MemoryUnitOfWork {
    fn injected(&self, obligation_id: ObligationId, step: fn(&Faults) -> &HashSet<ObligationId>) -> bool {
        let faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.unavailable || step(&faults).contains(&obligation_id)
    }
}

#[async_trait]
impl ObligationUnitOfWork for MemoryUnitOfWork {
    async fn occurrence_exists(
        &mut self,
        obligation_id: ObligationId,
        due_date: NaiveDate,
    ) -> Result<bool, PortError> {
        Ok(self.staged.has_occurrence(obligation_id, due_date))
    }

    async fn insert_occurrence(&mut self, occurrence: &MaterializedOccurrence) -> Result<(), PortError> {
        if let Some(obligation_id) = occurrence.obligation_id {
            if self.injected(obligation_id, |f| &f.fail_insert) {
                return Err(PortError::connection("injected insert failure"));
            }
        }
        self.staged.insert_occurrence(occurrence)
    }

    async fn advance_schedule(
        &mut self,
        obligation_id: ObligationId,
        expected: NextDue,
        last_materialized: NaiveDate,
        next_due: NextDue,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        if self.injected(obligation_id, |f| &f.fail_advance) {
            return Err(PortError::connection("injected advance failure"));
        }
        let obligation = self
            .staged
            .obligations
            .get_mut(&obligation_id)
            .ok_or_else(|| PortError::not_found("RecurringObligation", obligation_id))?;
        if obligation.next_due != expected {
            return Err(PortError::conflict(format!(
                "schedule of {obligation_id} moved from {expected} to {}",
                obligation.next_due
            )));
        }
        obligation.last_materialized = Some(last_materialized);
        obligation.next_due = next_due;
        obligation.updated_at = updated_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let MemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        Ok(())
    }
}
