//! Credit domain errors

use thiserror::Error;

use core_kernel::{
    CalendarMonth, CreditEntryId, CustomerId, InvoiceId, MoneyError, PortError, ShopId,
};

/// Errors that can occur in the credit domain
#[derive(Debug, Error)]
pub enum CreditError {
    /// Credit amounts must be strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Currency mismatch: ledger uses {expected}, got {actual}")]
    CurrencyMismatch {
        expected: String,
        actual: String,
    },

    #[error("Credit entry not found: {0}")]
    EntryNotFound(CreditEntryId),

    #[error("Credit entry already settled: {0}")]
    AlreadySettled(CreditEntryId),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// An invoice already covers this customer, shop and month
    #[error("Invoice for {customer_id} at {shop_id} already exists for {period}")]
    DuplicateInvoice {
        customer_id: CustomerId,
        shop_id: ShopId,
        period: CalendarMonth,
    },

    #[error("Invalid billing period {month}/{year}")]
    InvalidPeriod {
        month: u32,
        year: i32,
    },

    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl CreditError {
    /// Returns true if the caller supplied bad input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CreditError::InvalidAmount(_)
                | CreditError::CurrencyMismatch { .. }
                | CreditError::InvalidPeriod { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CreditError::EntryNotFound(_) | CreditError::InvoiceNotFound(_)
        )
    }
}

impl From<MoneyError> for CreditError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::CurrencyMismatch(expected, actual) => {
                CreditError::CurrencyMismatch { expected, actual }
            }
            MoneyError::InvalidAmount(msg) => CreditError::InvalidAmount(msg),
            MoneyError::UnknownCurrency(code) => CreditError::InvalidAmount(format!(
                "unknown currency {code}"
            )),
        }
    }
}
