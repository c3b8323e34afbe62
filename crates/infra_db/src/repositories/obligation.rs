//! Obligation repository
//!
//! Raw access to `recurring_obligations` and `materialized_occurrences`.
//! The statements used during materialization are generic over the
//! executor so they run either on the pool or inside a transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct ObligationRow {
    pub obligation_id: Uuid,
    pub shop_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub cadence: String,
    pub interval_count: i32,
    pub day_of_month: Option<i16>,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: Option<i16>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub last_materialized: Option<NaiveDate>,
    /// NULL once the series is exhausted
    pub next_due_date: Option<NaiveDate>,
    pub active: bool,
    pub vendor: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OccurrenceRow {
    pub occurrence_id: Uuid,
    pub shop_id: Uuid,
    pub category_id: Uuid,
    pub obligation_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub pay_by: NaiveDate,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub vendor: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

const OBLIGATION_COLUMNS: &str = "obligation_id, shop_id, category_id, name, description, amount, \
     currency, cadence, interval_count, day_of_month, day_of_week, start_date, end_date, \
     last_materialized, next_due_date, active, vendor, payment_method, notes, created_at, updated_at";

const OCCURRENCE_COLUMNS: &str = "occurrence_id, shop_id, category_id, obligation_id, name, \
     description, amount, currency, due_date, pay_by, status, paid_at, payment_method, vendor, \
     notes, created_at";

/// Repository for recurring obligations and their occurrences
#[derive(Debug, Clone)]
pub struct ObligationRepository {
    pool: PgPool,
}

impl ObligationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        Ok(self.pool.begin().await?)
    }

    /// Active obligations due on or before `as_of` whose due date is inside the end date
    pub async fn due_obligations(&self, as_of: NaiveDate) -> Result<Vec<ObligationRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ObligationRow>(&format!(
            r#"
            SELECT {OBLIGATION_COLUMNS} FROM recurring_obligations
            WHERE active
              AND next_due_date IS NOT NULL
              AND next_due_date <= $1
              AND (end_date IS NULL OR next_due_date <= end_date)
            ORDER BY next_due_date ASC, obligation_id ASC
            "#
        ))
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_obligation(&self, obligation_id: Uuid) -> Result<ObligationRow, DatabaseError> {
        sqlx::query_as::<_, ObligationRow>(&format!(
            "SELECT {OBLIGATION_COLUMNS} FROM recurring_obligations WHERE obligation_id = $1"
        ))
        .bind(obligation_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("RecurringObligation", obligation_id))
    }

    /// Inserts the obligation or overwrites every column except `created_at`
    pub async fn upsert_obligation(&self, row: &ObligationRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO recurring_obligations (
                obligation_id, shop_id, category_id, name, description, amount, currency,
                cadence, interval_count, day_of_month, day_of_week, start_date, end_date,
                last_materialized, next_due_date, active, vendor, payment_method, notes,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            ON CONFLICT (obligation_id) DO UPDATE SET
                shop_id = EXCLUDED.shop_id,
                category_id = EXCLUDED.category_id,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                cadence = EXCLUDED.cadence,
                interval_count = EXCLUDED.interval_count,
                day_of_month = EXCLUDED.day_of_month,
                day_of_week = EXCLUDED.day_of_week,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                last_materialized = EXCLUDED.last_materialized,
                next_due_date = EXCLUDED.next_due_date,
                active = EXCLUDED.active,
                vendor = EXCLUDED.vendor,
                payment_method = EXCLUDED.payment_method,
                notes = EXCLUDED.notes,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(row.obligation_id)
        .bind(row.shop_id)
        .bind(row.category_id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.amount)
        .bind(&row.currency)
        .bind(&row.cadence)
        .bind(row.interval_count)
        .bind(row.day_of_month)
        .bind(row.day_of_week)
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.last_materialized)
        .bind(row.next_due_date)
        .bind(row.active)
        .bind(&row.vendor)
        .bind(&row.payment_method)
        .bind(&row.notes)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn shop_obligations(&self, shop_id: Uuid) -> Result<Vec<ObligationRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ObligationRow>(&format!(
            "SELECT {OBLIGATION_COLUMNS} FROM recurring_obligations WHERE shop_id = $1 ORDER BY name"
        ))
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_occurrence(&self, occurrence_id: Uuid) -> Result<OccurrenceRow, DatabaseError> {
        sqlx::query_as::<_, OccurrenceRow>(&format!(
            "SELECT {OCCURRENCE_COLUMNS} FROM materialized_occurrences WHERE occurrence_id = $1"
        ))
        .bind(occurrence_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("MaterializedOccurrence", occurrence_id))
    }

    /// Marks a pending occurrence paid; `None` when missing or already paid
    pub async fn pay_occurrence(
        &self,
        occurrence_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<OccurrenceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, OccurrenceRow>(&format!(
            r#"
            UPDATE materialized_occurrences
            SET status = 'paid', paid_at = $2
            WHERE occurrence_id = $1 AND status = 'pending'
            RETURNING {OCCURRENCE_COLUMNS}
            "#
        ))
        .bind(occurrence_id)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Latest due date first
    pub async fn shop_occurrences(&self, shop_id: Uuid) -> Result<Vec<OccurrenceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, OccurrenceRow>(&format!(
            r#"
            SELECT {OCCURRENCE_COLUMNS} FROM materialized_occurrences
            WHERE shop_id = $1
            ORDER BY due_date DESC, occurrence_id DESC
            "#
        ))
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Earliest due date first
    pub async fn obligation_occurrences(&self, obligation_id: Uuid) -> Result<Vec<OccurrenceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, OccurrenceRow>(&format!(
            r#"
            SELECT {OCCURRENCE_COLUMNS} FROM materialized_occurrences
            WHERE obligation_id = $1
            ORDER BY due_date ASC
            "#
        ))
        .bind(obligation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_occurrence<'e, E>(executor: E, row: &OccurrenceRow) -> Result<(), DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO materialized_occurrences (
                occurrence_id, shop_id, category_id, obligation_id, name, description,
                amount, currency, due_date, pay_by, status, paid_at, payment_method,
                vendor, notes, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(row.occurrence_id)
        .bind(row.shop_id)
        .bind(row.category_id)
        .bind(row.obligation_id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.amount)
        .bind(&row.currency)
        .bind(row.due_date)
        .bind(row.pay_by)
        .bind(&row.status)
        .bind(row.paid_at)
        .bind(&row.payment_method)
        .bind(&row.vendor)
        .bind(&row.notes)
        .bind(row.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn occurrence_exists<'e, E>(
        executor: E,
        obligation_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<bool, DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM materialized_occurrences
                WHERE obligation_id = $1 AND due_date = $2
            )
            "#,
        )
        .bind(obligation_id)
        .bind(due_date)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    /// Compare-and-set on `next_due_date`
    ///
    /// Fails with `StaleUpdate` when the stored date no longer equals
    /// `expected`.
    pub async fn advance_schedule<'e, E>(
        executor: E,
        obligation_id: Uuid,
        expected: Option<NaiveDate>,
        last_materialized: NaiveDate,
        next_due_date: Option<NaiveDate>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE recurring_obligations
            SET last_materialized = $3, next_due_date = $4, updated_at = $5
            WHERE obligation_id = $1 AND next_due_date IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(obligation_id)
        .bind(expected)
        .bind(last_materialized)
        .bind(next_due_date)
        .bind(updated_at)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::StaleUpdate(format!(
                "schedule of obligation {obligation_id} no longer at {expected:?}"
            )));
        }
        Ok(())
    }
}
