//! Credit repository
//!
//! Raw access to `credit_entries`, `invoices`, `invoice_line_items` and
//! `customers`. Rows are plain column structs; mapping to domain types is
//! done by the adapters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct CreditEntryRow {
    pub entry_id: Uuid,
    pub customer_id: Uuid,
    pub shop_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub kind: String,
    pub description: String,
    pub originating_transaction: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub shop_id: Uuid,
    pub period_year: i32,
    pub period_month: i32,
    pub total_amount: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceLineItemRow {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub source_entry_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub entry_date: DateTime<Utc>,
    pub position: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct CustomerRow {
    pub customer_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

const ENTRY_COLUMNS: &str = "entry_id, customer_id, shop_id, amount, currency, status, kind, \
     description, originating_transaction, created_at, settled_at";

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, customer_id, shop_id, period_year, \
     period_month, total_amount, currency, created_at, sent, sent_at, notes";

const ITEM_COLUMNS: &str =
    "item_id, invoice_id, source_entry_id, amount, currency, description, entry_date, position";

/// Repository for credit entries, invoices and customer contacts
#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: PgPool,
}

impl CreditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_entry(&self, row: &CreditEntryRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO credit_entries (
                entry_id, customer_id, shop_id, amount, currency, status, kind,
                description, originating_transaction, created_at, settled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.entry_id)
        .bind(row.customer_id)
        .bind(row.shop_id)
        .bind(row.amount)
        .bind(&row.currency)
        .bind(&row.status)
        .bind(&row.kind)
        .bind(&row.description)
        .bind(row.originating_transaction)
        .bind(row.created_at)
        .bind(row.settled_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_entry(&self, entry_id: Uuid) -> Result<CreditEntryRow, DatabaseError> {
        sqlx::query_as::<_, CreditEntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM credit_entries WHERE entry_id = $1"
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("CreditEntry", entry_id))
    }

    /// Settles a due entry; `None` when the entry is missing or not due
    pub async fn settle_entry(
        &self,
        entry_id: Uuid,
        settled_at: DateTime<Utc>,
    ) -> Result<Option<CreditEntryRow>, DatabaseError> {
        let row = sqlx::query_as::<_, CreditEntryRow>(&format!(
            r#"
            UPDATE credit_entries
            SET status = 'settled', settled_at = $2
            WHERE entry_id = $1 AND status = 'due'
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(entry_id)
        .bind(settled_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn due_entries(&self, customer_id: Uuid, shop_id: Uuid) -> Result<Vec<CreditEntryRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CreditEntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM credit_entries
            WHERE customer_id = $1 AND shop_id = $2 AND status = 'due'
            "#
        ))
        .bind(customer_id)
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Entries created in `[from, until)`, oldest first
    pub async fn entries_created_between(
        &self,
        customer_id: Uuid,
        shop_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CreditEntryRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CreditEntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM credit_entries
            WHERE customer_id = $1 AND shop_id = $2
              AND created_at >= $3 AND created_at < $4
            ORDER BY created_at ASC, entry_id ASC
            "#
        ))
        .bind(customer_id)
        .bind(shop_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn customer_entries(&self, customer_id: Uuid, shop_id: Uuid) -> Result<Vec<CreditEntryRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CreditEntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM credit_entries
            WHERE customer_id = $1 AND shop_id = $2
            ORDER BY created_at DESC, entry_id DESC
            "#
        ))
        .bind(customer_id)
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn shop_entries(&self, shop_id: Uuid, status: Option<&str>) -> Result<Vec<CreditEntryRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CreditEntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM credit_entries
            WHERE shop_id = $1 AND ($2::text IS NULL OR status = $2::text)
            ORDER BY created_at DESC, entry_id DESC
            "#
        ))
        .bind(shop_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Writes the invoice and its items in one transaction
    pub async fn insert_invoice(&self, invoice: &InvoiceRow, items: &[InvoiceLineItemRow]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, customer_id, shop_id, period_year, period_month,
                total_amount, currency, created_at, sent, sent_at, notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.customer_id)
        .bind(invoice.shop_id)
        .bind(invoice.period_year)
        .bind(invoice.period_month)
        .bind(invoice.total_amount)
        .bind(&invoice.currency)
        .bind(invoice.created_at)
        .bind(invoice.sent)
        .bind(invoice.sent_at)
        .bind(&invoice.notes)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (
                    item_id, invoice_id, source_entry_id, amount, currency,
                    description, entry_date, position
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.item_id)
            .bind(item.invoice_id)
            .bind(item.source_entry_id)
            .bind(item.amount)
            .bind(&item.currency)
            .bind(&item.description)
            .bind(item.entry_date)
            .bind(item.position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<InvoiceRow, DatabaseError> {
        sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))
    }

    pub async fn find_invoice_for_period(
        &self,
        customer_id: Uuid,
        shop_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<Option<InvoiceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE customer_id = $1 AND shop_id = $2 AND period_year = $3 AND period_month = $4
            "#
        ))
        .bind(customer_id)
        .bind(shop_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Newest period first
    pub async fn customer_invoices(&self, customer_id: Uuid, shop_id: Uuid) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE customer_id = $1 AND shop_id = $2
            ORDER BY period_year DESC, period_month DESC
            "#
        ))
        .bind(customer_id)
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Items of the given invoices, grouped by invoice in original order
    pub async fn invoice_items(&self, invoice_ids: &[Uuid]) -> Result<Vec<InvoiceLineItemRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceLineItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM invoice_line_items
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, position
            "#
        ))
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_invoice_sent(&self, invoice_id: Uuid, sent_at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE invoices SET sent = TRUE, sent_at = $2 WHERE invoice_id = $1")
            .bind(invoice_id)
            .bind(sent_at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", invoice_id));
        }
        Ok(())
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Option<CustomerRow>, DatabaseError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT customer_id, full_name, email, phone_number FROM customers WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_customer(&self, row: &CustomerRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO customers (customer_id, full_name, email, phone_number)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (customer_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                phone_number = EXCLUDED.phone_number
            "#,
        )
        .bind(row.customer_id)
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(&row.phone_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
