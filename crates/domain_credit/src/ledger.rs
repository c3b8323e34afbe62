//! Credit ledger service
//!
//! Opens and settles credit entries and reports what a customer still owes.
//! Each mutation is persisted first; the customer is told afterwards and a
//! failed notification never undoes the mutation.

use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{Clock, CreditEntryId, Currency, CustomerId, Money, PortError, ShopId};

use crate::entry::{CreditEntry, CreditStatus, OpenCredit};
use crate::error::CreditError;
use crate::notification::{CustomerNotifier, Notice};
use crate::ports::CreditStore;

/// Records store credit for a single ledger currency
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn CreditStore>,
    notifier: CustomerNotifier,
    clock: Arc<dyn Clock>,
    currency: Currency,
}

impl CreditLedger {
    pub fn new(
        store: Arc<dyn CreditStore>,
        notifier: CustomerNotifier,
        clock: Arc<dyn Clock>,
        currency: Currency,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            currency,
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Opens a Due entry
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` when the amount is zero or negative
    /// * `CurrencyMismatch` when the amount is not in the ledger currency
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, shop_id = %request.shop_id))]
    pub async fn open(&self, request: OpenCredit) -> Result<CreditEntry, CreditError> {
        if !request.amount.is_positive() {
            return Err(CreditError::InvalidAmount(format!(
                "credit amount must be positive, got {}",
                request.amount
            )));
        }
        if request.amount.currency() != self.currency {
            return Err(CreditError::CurrencyMismatch {
                expected: self.currency.to_string(),
                actual: request.amount.currency().to_string(),
            });
        }

        let entry = CreditEntry::open(request, self.clock.now());
        self.store.insert_entry(&entry).await?;
        info!(entry_id = %entry.id, amount = %entry.amount, "Credit entry opened");

        let notice = Notice::new(
            "New Credit Entry",
            format!(
                "New credit entry recorded. Amount: {}. Description: {}",
                entry.amount, entry.description
            ),
        );
        self.notifier.notify(entry.customer_id, &notice).await;

        Ok(entry)
    }

    /// Settles a Due entry
    ///
    /// A second settlement of the same entry fails with `AlreadySettled` and
    /// leaves `settled_at` untouched.
    #[instrument(skip(self))]
    pub async fn settle(&self, entry_id: CreditEntryId) -> Result<CreditEntry, CreditError> {
        let mut entry = self.store.get_entry(entry_id).await.map_err(|e| match e {
            PortError::NotFound { .. } => CreditError::EntryNotFound(entry_id),
            other => CreditError::Store(other),
        })?;

        let settled_at = self.clock.now();
        entry.settle(settled_at)?;

        // The store re-checks the status so a concurrent settle loses cleanly.
        let entry = self
            .store
            .mark_settled(entry_id, settled_at)
            .await
            .map_err(|e| match e {
                PortError::NotFound { .. } => CreditError::EntryNotFound(entry_id),
                PortError::Conflict { .. } => CreditError::AlreadySettled(entry_id),
                other => CreditError::Store(other),
            })?;
        info!(%entry_id, amount = %entry.amount, "Credit entry settled");

        let notice = Notice::new(
            "Credit Settled",
            format!("Credit entry settled. Amount: {}", entry.amount),
        );
        self.notifier.notify(entry.customer_id, &notice).await;

        Ok(entry)
    }

    /// Sum of the Due entries for the pair; zero when nothing is owed
    pub async fn outstanding_balance(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Money, CreditError> {
        let due = self.store.due_entries(customer_id, shop_id).await?;
        Ok(Money::sum(self.currency, due.iter().map(|e| &e.amount))?)
    }

    pub async fn get_entry(&self, entry_id: CreditEntryId) -> Result<CreditEntry, CreditError> {
        self.store.get_entry(entry_id).await.map_err(|e| match e {
            PortError::NotFound { .. } => CreditError::EntryNotFound(entry_id),
            other => CreditError::Store(other),
        })
    }

    /// Every entry for the pair, newest first
    pub async fn customer_entries(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<CreditEntry>, CreditError> {
        Ok(self.store.customer_entries(customer_id, shop_id).await?)
    }

    pub async fn shop_entries(
        &self,
        shop_id: ShopId,
        status: Option<CreditStatus>,
    ) -> Result<Vec<CreditEntry>, CreditError> {
        Ok(self.store.shop_entries(shop_id, status).await?)
    }
}

impl std::fmt::Debug for CreditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditLedger")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryCreditStore, InMemoryCustomerDirectory, OutboxNotificationSender};
    use core_kernel::FixedClock;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn ledger() -> (CreditLedger, Arc<InMemoryCreditStore>) {
        let store = Arc::new(InMemoryCreditStore::new());
        let notifier = CustomerNotifier::new(
            Arc::new(InMemoryCustomerDirectory::new()),
            Arc::new(OutboxNotificationSender::new()),
            Duration::from_secs(1),
        );
        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));
        (
            CreditLedger::new(store.clone(), notifier, clock, Currency::BDT),
            store,
        )
    }

    #[tokio::test]
    async fn test_zero_amount_rejected_without_mutation() {
        let (ledger, store) = ledger();
        let request = OpenCredit::purchase(
            CustomerId::new(),
            ShopId::new(),
            Money::zero(Currency::BDT),
            "Nothing",
        );
        let result = ledger.open(request).await;
        assert!(matches!(result, Err(CreditError::InvalidAmount(_))));
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_foreign_currency_rejected() {
        let (ledger, _) = ledger();
        let request = OpenCredit::purchase(
            CustomerId::new(),
            ShopId::new(),
            Money::new(dec!(5), Currency::USD),
            "Imported tea",
        );
        let result = ledger.open(request).await;
        assert!(matches!(result, Err(CreditError::CurrencyMismatch { .. })));
    }

    #[tokio::test]
    async fn test_settle_unknown_entry() {
        let (ledger, _) = ledger();
        let id = CreditEntryId::new();
        assert!(matches!(
            ledger.settle(id).await,
            Err(CreditError::EntryNotFound(found)) if found == id
        ));
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_store_error() {
        let (ledger, store) = ledger();
        store.set_unavailable(true);
        let result = ledger.outstanding_balance(CustomerId::new(), ShopId::new()).await;
        assert!(matches!(result, Err(CreditError::Store(e)) if e.is_transient()));
    }
}
