//! PostgreSQL credit adapters
//!
//! `PostgresCreditStore` implements the `CreditStore` port and
//! `PostgresCustomerDirectory` the `CustomerDirectory` port, both on top of
//! `CreditRepository`.
//!
//! # Error Handling
//!
//! - a missing row becomes `PortError::NotFound`
//! - a unique violation (duplicate invoice period or number) and a failed
//!   compare-and-set become `PortError::Conflict`
//! - pool and connection failures become `PortError::Connection`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    CalendarMonth, CreditEntryId, CustomerId, DomainPort, HealthCheckResult, HealthCheckable,
    InvoiceId, PortError, ShopId,
};
use domain_credit::{
    CreditEntry, CreditStatus, CreditStore, CustomerContact, CustomerDirectory, Invoice,
    InvoiceLineItem,
};

use crate::adapters::{decode, money, ping};
use crate::error::DatabaseError;
use crate::repositories::credit::{
    CreditEntryRow, CreditRepository, CustomerRow, InvoiceLineItemRow, InvoiceRow,
};

/// PostgreSQL-backed `CreditStore`
#[derive(Debug, Clone)]
pub struct PostgresCreditStore {
    repository: CreditRepository,
    pool: PgPool,
}

impl PostgresCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: CreditRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn repository(&self) -> &CreditRepository {
        &self.repository
    }

    async fn load_invoices(&self, rows: Vec<InvoiceRow>) -> Result<Vec<Invoice>, PortError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.invoice_id).collect();
        let mut items: HashMap<Uuid, Vec<InvoiceLineItemRow>> = HashMap::new();
        for item in self.repository.invoice_items(&ids).await? {
            items.entry(item.invoice_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let own = items.remove(&row.invoice_id).unwrap_or_default();
                row_to_invoice(row, own).map_err(PortError::from)
            })
            .collect()
    }
}

impl DomainPort for PostgresCreditStore {}

#[async_trait]
impl HealthCheckable for PostgresCreditStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-credit-store").await
    }
}

#[async_trait]
impl CreditStore for PostgresCreditStore {
    #[instrument(skip_all, fields(entry_id = %entry.id))]
    async fn insert_entry(&self, entry: &CreditEntry) -> Result<(), PortError> {
        self.repository.insert_entry(&entry_to_row(entry)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    async fn get_entry(&self, id: CreditEntryId) -> Result<CreditEntry, PortError> {
        let row = self.repository.get_entry(id.into()).await?;
        Ok(row_to_entry(row)?)
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    async fn mark_settled(&self, id: CreditEntryId, settled_at: DateTime<Utc>) -> Result<CreditEntry, PortError> {
        match self.repository.settle_entry(id.into(), settled_at).await? {
            Some(row) => Ok(row_to_entry(row)?),
            None => {
                // distinguishes a missing entry from one that is no longer due
                self.repository.get_entry(id.into()).await?;
                debug!("Entry already settled");
                Err(PortError::conflict(format!("credit entry {id} is not due")))
            }
        }
    }

    async fn due_entries(&self, customer_id: CustomerId, shop_id: ShopId) -> Result<Vec<CreditEntry>, PortError> {
        let rows = self.repository.due_entries(customer_id.into(), shop_id.into()).await?;
        rows_to_entries(rows)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id, shop_id = %shop_id))]
    async fn entries_created_between(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CreditEntry>, PortError> {
        let rows = self
            .repository
            .entries_created_between(customer_id.into(), shop_id.into(), from, until)
            .await?;
        rows_to_entries(rows)
    }

    async fn customer_entries(&self, customer_id: CustomerId, shop_id: ShopId) -> Result<Vec<CreditEntry>, PortError> {
        let rows = self.repository.customer_entries(customer_id.into(), shop_id.into()).await?;
        rows_to_entries(rows)
    }

    async fn shop_entries(&self, shop_id: ShopId, status: Option<CreditStatus>) -> Result<Vec<CreditEntry>, PortError> {
        let rows = self
            .repository
            .shop_entries(shop_id.into(), status.as_ref().map(CreditStatus::as_str))
            .await?;
        rows_to_entries(rows)
    }

    #[instrument(skip_all, fields(invoice_id = %invoice.id, items = invoice.items.len()))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        let items: Vec<InvoiceLineItemRow> = invoice
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| item_to_row(item, position))
            .collect();
        self.repository.insert_invoice(&invoice_to_row(invoice), &items).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let row = self.repository.get_invoice(id.into()).await?;
        let mut invoices = self.load_invoices(vec![row]).await?;
        invoices
            .pop()
            .ok_or_else(|| PortError::not_found("Invoice", id))
    }

    async fn find_invoice_for_period(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        period: CalendarMonth,
    ) -> Result<Option<Invoice>, PortError> {
        let row = self
            .repository
            .find_invoice_for_period(customer_id.into(), shop_id.into(), period.year(), period.month() as i32)
            .await?;
        match row {
            Some(row) => Ok(self.load_invoices(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn mark_invoice_sent(&self, id: InvoiceId, sent_at: DateTime<Utc>) -> Result<(), PortError> {
        self.repository.mark_invoice_sent(id.into(), sent_at).await?;
        Ok(())
    }

    async fn customer_invoices(&self, customer_id: CustomerId, shop_id: ShopId) -> Result<Vec<Invoice>, PortError> {
        let rows = self.repository.customer_invoices(customer_id.into(), shop_id.into()).await?;
        self.load_invoices(rows).await
    }
}

/// PostgreSQL-backed `CustomerDirectory` over the `customers` table
#[derive(Debug, Clone)]
pub struct PostgresCustomerDirectory {
    repository: CreditRepository,
}

impl PostgresCustomerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: CreditRepository::new(pool),
        }
    }

    pub async fn upsert(&self, contact: &CustomerContact) -> Result<(), PortError> {
        self.repository
            .upsert_customer(&CustomerRow {
                customer_id: contact.customer_id.into(),
                full_name: contact.full_name.clone(),
                email: contact.email.clone(),
                phone_number: contact.phone_number.clone(),
            })
            .await?;
        Ok(())
    }
}

impl DomainPort for PostgresCustomerDirectory {}

#[async_trait]
impl CustomerDirectory for PostgresCustomerDirectory {
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn contact(&self, customer_id: CustomerId) -> Result<Option<CustomerContact>, PortError> {
        let row = self.repository.get_customer(customer_id.into()).await?;
        Ok(row.map(|row| CustomerContact {
            customer_id: CustomerId::from(row.customer_id),
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
        }))
    }
}

fn entry_to_row(entry: &CreditEntry) -> CreditEntryRow {
    CreditEntryRow {
        entry_id: entry.id.into(),
        customer_id: entry.customer_id.into(),
        shop_id: entry.shop_id.into(),
        amount: entry.amount.amount(),
        currency: entry.amount.currency().code().to_string(),
        status: entry.status.as_str().to_string(),
        kind: entry.kind.as_str().to_string(),
        description: entry.description.clone(),
        originating_transaction: entry.originating_transaction.map(Uuid::from),
        created_at: entry.created_at,
        settled_at: entry.settled_at,
    }
}

fn row_to_entry(row: CreditEntryRow) -> Result<CreditEntry, DatabaseError> {
    Ok(CreditEntry {
        id: row.entry_id.into(),
        customer_id: row.customer_id.into(),
        shop_id: row.shop_id.into(),
        amount: money(row.amount, &row.currency)?,
        status: decode("credit_entries.status", &row.status)?,
        created_at: row.created_at,
        settled_at: row.settled_at,
        description: row.description,
        kind: decode("credit_entries.kind", &row.kind)?,
        originating_transaction: row.originating_transaction.map(Into::into),
    })
}

fn rows_to_entries(rows: Vec<CreditEntryRow>) -> Result<Vec<CreditEntry>, PortError> {
    rows.into_iter()
        .map(|row| row_to_entry(row).map_err(PortError::from))
        .collect()
}

fn invoice_to_row(invoice: &Invoice) -> InvoiceRow {
    InvoiceRow {
        invoice_id: invoice.id.into(),
        invoice_number: invoice.invoice_number.clone(),
        customer_id: invoice.customer_id.into(),
        shop_id: invoice.shop_id.into(),
        period_year: invoice.period.year(),
        period_month: invoice.period.month() as i32,
        total_amount: invoice.total.amount(),
        currency: invoice.total.currency().code().to_string(),
        created_at: invoice.created_at,
        sent: invoice.sent,
        sent_at: invoice.sent_at,
        notes: invoice.notes.clone(),
    }
}

fn item_to_row(item: &InvoiceLineItem, position: usize) -> InvoiceLineItemRow {
    InvoiceLineItemRow {
        item_id: item.id.into(),
        invoice_id: item.invoice_id.into(),
        source_entry_id: item.source_entry_id.into(),
        amount: item.amount.amount(),
        currency: item.amount.currency().code().to_string(),
        description: item.description.clone(),
        entry_date: item.entry_date,
        position: i32::try_from(position).unwrap_or(i32::MAX),
    }
}

fn row_to_invoice(row: InvoiceRow, items: Vec<InvoiceLineItemRow>) -> Result<Invoice, DatabaseError> {
    let month = u32::try_from(row.period_month)
        .map_err(|_| DatabaseError::CorruptRow(format!("invoices.period_month {}", row.period_month)))?;
    let period = CalendarMonth::new(row.period_year, month)
        .map_err(|e| DatabaseError::CorruptRow(format!("invoices period: {e}")))?;

    let items = items
        .into_iter()
        .map(|item| {
            Ok(InvoiceLineItem {
                id: item.item_id.into(),
                invoice_id: item.invoice_id.into(),
                source_entry_id: item.source_entry_id.into(),
                amount: money(item.amount, &item.currency)?,
                description: item.description,
                entry_date: item.entry_date,
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    Ok(Invoice {
        id: row.invoice_id.into(),
        invoice_number: row.invoice_number,
        customer_id: row.customer_id.into(),
        shop_id: row.shop_id.into(),
        period,
        total: money(row.total_amount, &row.currency)?,
        created_at: row.created_at,
        sent: row.sent,
        sent_at: row.sent_at,
        notes: row.notes,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, Money};
    use domain_credit::OpenCredit;
    use rust_decimal_macros::dec;

    #[test]
    fn test_entry_row_mapping_preserves_fields() {
        let entry = CreditEntry::open(
            OpenCredit::purchase(
                CustomerId::new(),
                ShopId::new(),
                Money::new(dec!(250.50), Currency::BDT),
                "Lentils",
            ),
            Utc::now(),
        );
        let row = entry_to_row(&entry);
        assert_eq!(row.status, "due");
        assert_eq!(row.kind, "purchase");
        assert_eq!(row.currency, "BDT");
        assert_eq!(row_to_entry(row).unwrap(), entry);
    }

    #[test]
    fn test_unknown_status_is_corrupt_row() {
        let mut row = entry_to_row(&CreditEntry::open(
            OpenCredit::purchase(
                CustomerId::new(),
                ShopId::new(),
                Money::new(dec!(10), Currency::BDT),
                "Tea",
            ),
            Utc::now(),
        ));
        row.status = "written_off".to_string();
        assert!(matches!(row_to_entry(row), Err(DatabaseError::CorruptRow(_))));
    }

    #[test]
    fn test_invoice_row_with_bad_month_rejected() {
        let row = InvoiceRow {
            invoice_id: Uuid::now_v7(),
            invoice_number: "INV-20250401-0000000001".to_string(),
            customer_id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            period_year: 2025,
            period_month: 13,
            total_amount: dec!(0),
            currency: "BDT".to_string(),
            created_at: Utc::now(),
            sent: false,
            sent_at: None,
            notes: None,
        };
        assert!(matches!(row_to_invoice(row, Vec::new()), Err(DatabaseError::CorruptRow(_))));
    }
}
