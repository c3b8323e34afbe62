//! Credit entries
//!
//! A credit entry records store credit extended to a customer by a shop.
//! Entries are created Due and move one way to Settled; they are never
//! deleted and their amount never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CreditEntryId, CustomerId, Money, PosTransactionId, ShopId};

use crate::error::CreditError;

/// Settlement status of a credit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Due,
    Settled,
}

impl CreditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::Due => "due",
            CreditStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "due" => Ok(CreditStatus::Due),
            "settled" => Ok(CreditStatus::Settled),
            other => Err(format!("unknown credit status '{other}'")),
        }
    }
}

/// What gave rise to the credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    /// Goods taken on credit
    Purchase,
    /// A partial payment recorded against the tab
    Payment,
    Refund,
}

impl CreditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditKind::Purchase => "purchase",
            CreditKind::Payment => "payment",
            CreditKind::Refund => "refund",
        }
    }
}

impl FromStr for CreditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(CreditKind::Purchase),
            "payment" => Ok(CreditKind::Payment),
            "refund" => Ok(CreditKind::Refund),
            other => Err(format!("unknown credit kind '{other}'")),
        }
    }
}

/// Request to open a new credit entry
#[derive(Debug, Clone)]
pub struct OpenCredit {
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub amount: Money,
    pub kind: CreditKind,
    pub description: String,
    /// POS sale that produced this credit, if any
    pub originating_transaction: Option<PosTransactionId>,
}

impl OpenCredit {
    pub fn purchase(customer_id: CustomerId, shop_id: ShopId, amount: Money, description: impl Into<String>) -> Self {
        Self {
            customer_id,
            shop_id,
            amount,
            kind: CreditKind::Purchase,
            description: description.into(),
            originating_transaction: None,
        }
    }

    pub fn with_transaction(mut self, transaction: PosTransactionId) -> Self {
        self.originating_transaction = Some(transaction);
        self
    }
}

/// Store credit owed by one customer to one shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: CreditEntryId,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub amount: Money,
    pub status: CreditStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly when `status` is Settled
    pub settled_at: Option<DateTime<Utc>>,
    pub description: String,
    pub kind: CreditKind,
    pub originating_transaction: Option<PosTransactionId>,
}

impl CreditEntry {
    /// Builds a Due entry from a validated request
    pub fn open(request: OpenCredit, created_at: DateTime<Utc>) -> Self {
        Self {
            id: CreditEntryId::new_v7(),
            customer_id: request.customer_id,
            shop_id: request.shop_id,
            amount: request.amount,
            status: CreditStatus::Due,
            created_at,
            settled_at: None,
            description: request.description,
            kind: request.kind,
            originating_transaction: request.originating_transaction,
        }
    }

    pub fn is_due(&self) -> bool {
        self.status == CreditStatus::Due
    }

    /// Moves the entry to Settled
    ///
    /// Fails without touching `settled_at` if the entry is already settled.
    pub fn settle(&mut self, at: DateTime<Utc>) -> Result<(), CreditError> {
        if self.status == CreditStatus::Settled {
            return Err(CreditError::AlreadySettled(self.id));
        }
        self.status = CreditStatus::Settled;
        self.settled_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn entry() -> CreditEntry {
        let request = OpenCredit::purchase(
            CustomerId::new(),
            ShopId::new(),
            Money::new(dec!(500), Currency::BDT),
            "Rice 10kg",
        );
        CreditEntry::open(request, Utc::now())
    }

    #[test]
    fn test_open_creates_due_entry() {
        let e = entry();
        assert!(e.is_due());
        assert!(e.settled_at.is_none());
        assert_eq!(e.kind, CreditKind::Purchase);
    }

    #[test]
    fn test_settle_twice_keeps_first_timestamp() {
        let mut e = entry();
        let first = Utc::now();
        e.settle(first).unwrap();

        let again = e.settle(first + chrono::Duration::hours(1));
        assert!(matches!(again, Err(CreditError::AlreadySettled(id)) if id == e.id));
        assert_eq!(e.settled_at, Some(first));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [CreditStatus::Due, CreditStatus::Settled] {
            assert_eq!(status.as_str().parse::<CreditStatus>().unwrap(), status);
        }
        assert!("overdue".parse::<CreditStatus>().is_err());
    }
}
