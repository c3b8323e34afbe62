//! PostgreSQL obligation adapter
//!
//! `PostgresObligationStore` implements `ObligationStore`. Its unit of work
//! wraps one database transaction: the occurrence insert and the schedule
//! compare-and-set either both commit or both roll back, and the
//! `(obligation_id, due_date)` unique key rejects a duplicate occurrence
//! even when two workers race.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, ObligationId, OccurrenceId, PortError, ShopId,
};
use domain_recurrence::{
    weekday_from_sunday_index, MaterializedOccurrence, NextDue, ObligationStore,
    ObligationUnitOfWork, RecurrenceRule, RecurringObligation,
};

use crate::adapters::{decode, money, ping};
use crate::error::{port_error, DatabaseError};
use crate::repositories::obligation::{ObligationRepository, ObligationRow, OccurrenceRow};

/// PostgreSQL-backed `ObligationStore`
#[derive(Debug, Clone)]
pub struct PostgresObligationStore {
    repository: ObligationRepository,
    pool: PgPool,
}

impl PostgresObligationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: ObligationRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn repository(&self) -> &ObligationRepository {
        &self.repository
    }
}

impl DomainPort for PostgresObligationStore {}

#[async_trait]
impl HealthCheckable for PostgresObligationStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-obligation-store").await
    }
}

#[async_trait]
impl ObligationStore for PostgresObligationStore {
    #[instrument(skip(self), fields(as_of = %as_of))]
    async fn due_obligations(&self, as_of: NaiveDate) -> Result<Vec<RecurringObligation>, PortError> {
        let rows = self.repository.due_obligations(as_of).await?;
        debug!(count = rows.len(), "Loaded due obligations");
        rows_to_obligations(rows)
    }

    #[instrument(skip(self), fields(obligation_id = %id))]
    async fn get_obligation(&self, id: ObligationId) -> Result<RecurringObligation, PortError> {
        let row = self.repository.get_obligation(id.into()).await?;
        Ok(row_to_obligation(row)?)
    }

    #[instrument(skip_all, fields(obligation_id = %obligation.id))]
    async fn save_obligation(&self, obligation: &RecurringObligation) -> Result<(), PortError> {
        self.repository.upsert_obligation(&obligation_to_row(obligation)).await?;
        Ok(())
    }

    async fn shop_obligations(&self, shop_id: ShopId) -> Result<Vec<RecurringObligation>, PortError> {
        let rows = self.repository.shop_obligations(shop_id.into()).await?;
        rows_to_obligations(rows)
    }

    #[instrument(skip_all, fields(occurrence_id = %occurrence.id))]
    async fn insert_occurrence(&self, occurrence: &MaterializedOccurrence) -> Result<(), PortError> {
        ObligationRepository::insert_occurrence(self.repository.pool(), &occurrence_to_row(occurrence)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(occurrence_id = %id))]
    async fn get_occurrence(&self, id: OccurrenceId) -> Result<MaterializedOccurrence, PortError> {
        let row = self.repository.get_occurrence(id.into()).await?;
        Ok(row_to_occurrence(row)?)
    }

    #[instrument(skip(self), fields(occurrence_id = %id))]
    async fn mark_occurrence_paid(
        &self,
        id: OccurrenceId,
        paid_at: DateTime<Utc>,
    ) -> Result<MaterializedOccurrence, PortError> {
        match self.repository.pay_occurrence(id.into(), paid_at).await? {
            Some(row) => Ok(row_to_occurrence(row)?),
            None => {
                self.repository.get_occurrence(id.into()).await?;
                Err(PortError::conflict(format!("occurrence {id} already paid")))
            }
        }
    }

    async fn shop_occurrences(&self, shop_id: ShopId) -> Result<Vec<MaterializedOccurrence>, PortError> {
        let rows = self.repository.shop_occurrences(shop_id.into()).await?;
        rows_to_occurrences(rows)
    }

    async fn obligation_occurrences(
        &self,
        obligation_id: ObligationId,
    ) -> Result<Vec<MaterializedOccurrence>, PortError> {
        let rows = self.repository.obligation_occurrences(obligation_id.into()).await?;
        rows_to_occurrences(rows)
    }

    async fn begin(&self) -> Result<Box<dyn ObligationUnitOfWork>, PortError> {
        let tx = self.repository.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One materialization transaction
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ObligationUnitOfWork for PgUnitOfWork {
    async fn occurrence_exists(
        &mut self,
        obligation_id: ObligationId,
        due_date: NaiveDate,
    ) -> Result<bool, PortError> {
        Ok(ObligationRepository::occurrence_exists(&mut *self.tx, obligation_id.into(), due_date).await?)
    }

    async fn insert_occurrence(&mut self, occurrence: &MaterializedOccurrence) -> Result<(), PortError> {
        ObligationRepository::insert_occurrence(&mut *self.tx, &occurrence_to_row(occurrence)).await?;
        Ok(())
    }

    async fn advance_schedule(
        &mut self,
        obligation_id: ObligationId,
        expected: NextDue,
        last_materialized: NaiveDate,
        next_due: NextDue,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        ObligationRepository::advance_schedule(
            &mut *self.tx,
            obligation_id.into(),
            expected.date(),
            last_materialized,
            next_due.date(),
            updated_at,
        )
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx.commit().await.map_err(port_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        self.tx.rollback().await.map_err(port_error)
    }
}

fn obligation_to_row(obligation: &RecurringObligation) -> ObligationRow {
    let rule = &obligation.rule;
    ObligationRow {
        obligation_id: obligation.id.into(),
        shop_id: obligation.shop_id.into(),
        category_id: obligation.category_id.into(),
        name: obligation.name.clone(),
        description: obligation.description.clone(),
        amount: obligation.amount.amount(),
        currency: obligation.amount.currency().code().to_string(),
        cadence: rule.cadence.as_str().to_string(),
        interval_count: i32::try_from(rule.interval).unwrap_or(i32::MAX),
        day_of_month: rule.day_of_month.and_then(|d| i16::try_from(d).ok()),
        day_of_week: rule.day_of_week.map(|w| w.num_days_from_sunday() as i16),
        start_date: rule.start_date,
        end_date: rule.end_date,
        last_materialized: obligation.last_materialized,
        next_due_date: obligation.next_due.date(),
        active: obligation.active,
        vendor: obligation.vendor.clone(),
        payment_method: obligation.payment_method.clone(),
        notes: obligation.notes.clone(),
        created_at: obligation.created_at,
        updated_at: obligation.updated_at,
    }
}

fn row_to_obligation(row: ObligationRow) -> Result<RecurringObligation, DatabaseError> {
    let interval = u32::try_from(row.interval_count)
        .map_err(|_| DatabaseError::CorruptRow(format!("interval_count {}", row.interval_count)))?;
    let day_of_month = row
        .day_of_month
        .map(|d| u32::try_from(d).map_err(|_| DatabaseError::CorruptRow(format!("day_of_month {d}"))))
        .transpose()?;
    let day_of_week = row
        .day_of_week
        .map(|d| {
            u32::try_from(d)
                .ok()
                .and_then(weekday_from_sunday_index)
                .ok_or_else(|| DatabaseError::CorruptRow(format!("day_of_week {d}")))
        })
        .transpose()?;

    Ok(RecurringObligation {
        id: row.obligation_id.into(),
        shop_id: row.shop_id.into(),
        category_id: row.category_id.into(),
        name: row.name,
        description: row.description,
        amount: money(row.amount, &row.currency)?,
        rule: RecurrenceRule {
            cadence: decode("recurring_obligations.cadence", &row.cadence)?,
            interval,
            day_of_month,
            day_of_week,
            start_date: row.start_date,
            end_date: row.end_date,
        },
        last_materialized: row.last_materialized,
        next_due: NextDue::from_date(row.next_due_date),
        active: row.active,
        vendor: row.vendor,
        payment_method: row.payment_method,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn rows_to_obligations(rows: Vec<ObligationRow>) -> Result<Vec<RecurringObligation>, PortError> {
    rows.into_iter()
        .map(|row| row_to_obligation(row).map_err(PortError::from))
        .collect()
}

fn occurrence_to_row(occurrence: &MaterializedOccurrence) -> OccurrenceRow {
    OccurrenceRow {
        occurrence_id: occurrence.id.into(),
        shop_id: occurrence.shop_id.into(),
        category_id: occurrence.category_id.into(),
        obligation_id: occurrence.obligation_id.map(Into::into),
        name: occurrence.name.clone(),
        description: occurrence.description.clone(),
        amount: occurrence.amount.amount(),
        currency: occurrence.amount.currency().code().to_string(),
        due_date: occurrence.due_date,
        pay_by: occurrence.pay_by,
        status: occurrence.status.as_str().to_string(),
        paid_at: occurrence.paid_at,
        payment_method: occurrence.payment_method.clone(),
        vendor: occurrence.vendor.clone(),
        notes: occurrence.notes.clone(),
        created_at: occurrence.created_at,
    }
}

fn row_to_occurrence(row: OccurrenceRow) -> Result<MaterializedOccurrence, DatabaseError> {
    Ok(MaterializedOccurrence {
        id: row.occurrence_id.into(),
        shop_id: row.shop_id.into(),
        category_id: row.category_id.into(),
        obligation_id: row.obligation_id.map(Into::into),
        name: row.name,
        description: row.description,
        amount: money(row.amount, &row.currency)?,
        due_date: row.due_date,
        pay_by: row.pay_by,
        status: decode("materialized_occurrences.status", &row.status)?,
        paid_at: row.paid_at,
        payment_method: row.payment_method,
        vendor: row.vendor,
        notes: row.notes,
        created_at: row.created_at,
    })
}

fn rows_to_occurrences(rows: Vec<OccurrenceRow>) -> Result<Vec<MaterializedOccurrence>, PortError> {
    rows.into_iter()
        .map(|row| row_to_occurrence(row).map_err(PortError::from))
        .collect()
}
