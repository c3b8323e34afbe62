//! Invoice aggregation
//!
//! Closes a calendar month of credit into an invoice and delivers it to the
//! customer. The month is interpreted in the shop's timezone, so an entry
//! opened at 01:00 local time on the 1st belongs to that month even though
//! it is still the previous day in UTC.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{
    CalendarMonth, Clock, Currency, CustomerId, InvoiceId, PortError, ShopId, Timezone,
};

use crate::error::CreditError;
use crate::invoice::{Invoice, InvoiceDelivery};
use crate::notification::CustomerNotifier;
use crate::ports::CreditStore;

/// Builds and sends monthly invoices
#[derive(Clone)]
pub struct InvoiceAggregator {
    store: Arc<dyn CreditStore>,
    notifier: CustomerNotifier,
    clock: Arc<dyn Clock>,
    currency: Currency,
    timezone: Timezone,
}

impl InvoiceAggregator {
    pub fn new(
        store: Arc<dyn CreditStore>,
        notifier: CustomerNotifier,
        clock: Arc<dyn Clock>,
        currency: Currency,
        timezone: Timezone,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            currency,
            timezone,
        }
    }

    /// Generates the invoice for one (customer, shop, month)
    ///
    /// Every entry created during the month is included whatever its status.
    /// A month that already has an invoice fails with `DuplicateInvoice`.
    #[instrument(skip_all, fields(customer_id = %customer_id, shop_id = %shop_id, month = month, year = year))]
    pub async fn generate_monthly_invoice(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
        month: u32,
        year: i32,
    ) -> Result<Invoice, CreditError> {
        let period = CalendarMonth::new(year, month)
            .map_err(|_| CreditError::InvalidPeriod { month, year })?;
        let duplicate = || CreditError::DuplicateInvoice {
            customer_id,
            shop_id,
            period,
        };

        if self
            .store
            .find_invoice_for_period(customer_id, shop_id, period)
            .await?
            .is_some()
        {
            return Err(duplicate());
        }

        let (from, until) = period.utc_bounds(&self.timezone);
        let entries = self
            .store
            .entries_created_between(customer_id, shop_id, from, until)
            .await?;

        let invoice = Invoice::from_entries(
            customer_id,
            shop_id,
            period,
            self.currency,
            &entries,
            self.clock.now(),
        )?;

        self.store.insert_invoice(&invoice).await.map_err(|e| match e {
            PortError::Conflict { .. } => duplicate(),
            other => CreditError::Store(other),
        })?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            %period,
            items = invoice.item_count(),
            total = %invoice.total,
            "Invoice generated"
        );
        Ok(invoice)
    }

    /// Delivers an invoice on every channel the customer has on file
    ///
    /// The invoice is marked sent when at least one channel succeeds.
    /// Sending again after a successful delivery is allowed.
    #[instrument(skip(self))]
    pub async fn send_invoice(&self, invoice_id: InvoiceId) -> Result<InvoiceDelivery, CreditError> {
        let invoice = self.get_invoice(invoice_id).await?;

        let report = self.notifier.notify(invoice.customer_id, &invoice.notice()).await;
        if !report.delivered() {
            warn!(%invoice_id, ?report, "Invoice not delivered on any channel");
            return Ok(InvoiceDelivery::NotDelivered);
        }

        let sent_at = self.clock.now();
        self.store
            .mark_invoice_sent(invoice_id, sent_at)
            .await
            .map_err(|e| match e {
                PortError::NotFound { .. } => CreditError::InvoiceNotFound(invoice_id),
                other => CreditError::Store(other),
            })?;
        info!(%invoice_id, ?report, "Invoice sent");

        Ok(InvoiceDelivery::Sent { sent_at })
    }

    pub async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice, CreditError> {
        self.store.get_invoice(invoice_id).await.map_err(|e| match e {
            PortError::NotFound { .. } => CreditError::InvoiceNotFound(invoice_id),
            other => CreditError::Store(other),
        })
    }

    pub async fn customer_invoices(
        &self,
        customer_id: CustomerId,
        shop_id: ShopId,
    ) -> Result<Vec<Invoice>, CreditError> {
        Ok(self.store.customer_invoices(customer_id, shop_id).await?)
    }
}

impl std::fmt::Debug for InvoiceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceAggregator")
            .field("currency", &self.currency)
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}
