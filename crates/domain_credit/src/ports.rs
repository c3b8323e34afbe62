//! Credit Domain Ports
//!
//! `CreditStore` is the durable record of credit entries and invoices keyed
//! by (customer, shop). Two adapters implement it:
//!
//! - **In-memory** (`crate::memory::InMemoryCreditStore`) for tests
//! - **PostgreSQL** (`infra_db::PostgresCreditStore`)
//!
//! ```rust,ignore
//! let store: Arc<dyn CreditStore> = Arc::new(PostgresCreditStore::new(pool));
//! let ledger = CreditLedger::new(store, notifier, clock, Currency::BDT);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{
    CalendarMonth, CreditEntryId, CustomerId, DomainPort, InvoiceId, PortError, ShopId,
};

use crate::entry::{CreditEntry, CreditStatus};
use crate::invoice::Invoice;

/// Storage port for the credit ledger
///
/// Adapters must enforce two guards themselves:
/// - `mark_settled` only transitions an entry whose status is still Due
/// - `insert_invoice` rejects a second invoice for the same
///   (customer, shop, period) or a reused invoice number
///
/// Both report `PortError::Conflict` when the guard fires.
#[async_trait]
pub trait CreditStore: DomainPort {
    async fn insert_entry(&self, entry: &CreditEntry) -> Result<(), PortError>;

    /// Returns `PortError::NotFound` for an unknown id
    async fn get_entry(&self, id: CreditEntryId) -> Result<CreditEntry, PortError>;

    /// Compare-and-set Due to Settled, returning the updated entry
    async fn mark_settled(
        &self,
        id: CreditEntryId,
        settled_at: DateTime<Utc>,
    ) -> Result<CreditEntry, PortError>;

    /// Due entries for the pair, in any order
    async fn due_entries(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<CreditEntry>, PortError>;

    /// Entries created in `[from, until)`, oldest first, regardless of status
    async fn entries_created_between(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CreditEntry>, PortError>;

    /// All entries for the pair, newest first
    async fn customer_entries(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<CreditEntry>, PortError>;

    /// Entries for a shop, optionally filtered by status, newest first
    async fn shop_entries(
        &self,
        shop_id: ShopId,
        status: Option<CreditStatus>,
    ) -> Result<Vec<CreditEntry>, PortError>;

    /// Persists an invoice with its items atomically
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError>;

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    async fn find_invoice_for_period(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        period: CalendarMonth,
    ) -> Result<Option<Invoice>, PortError>;

    /// Sets `sent` and `sent_at`; re-marking an already sent invoice is allowed
    async fn mark_invoice_sent(
        &self,
        id: InvoiceId,
        sent_at: DateTime<Utc>,
    ) -> Result<(), PortError>;

    /// Invoices for the pair, newest period first
    async fn customer_invoices(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<Invoice>, PortError>;
}
