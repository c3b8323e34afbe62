//! Materialized occurrences
//!
//! An occurrence is a payable expense record. The engine creates one per due
//! date of a recurring obligation; shop staff can also record one-off
//! expenses directly, in which case there is no obligation link.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use core_kernel::{ExpenseCategoryId, Money, ObligationId, OccurrenceId, ShopId};

use crate::error::RecurrenceError;
use crate::obligation::RecurringObligation;

/// Payment status of an occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Pending,
    Paid,
}

impl OccurrenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceStatus::Pending => "pending",
            OccurrenceStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OccurrenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OccurrenceStatus::Pending),
            "paid" => Ok(OccurrenceStatus::Paid),
            other => Err(format!("unknown occurrence status '{other}'")),
        }
    }
}

/// A payable expense, generated or user-entered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedOccurrence {
    pub id: OccurrenceId,
    pub shop_id: ShopId,
    pub category_id: ExpenseCategoryId,
    /// Set when generated from a recurring obligation
    pub obligation_id: Option<ObligationId>,
    pub name: String,
    pub description: Option<String>,
    pub amount: Money,
    pub due_date: NaiveDate,
    /// Last day to pay without being overdue
    pub pay_by: NaiveDate,
    pub status: OccurrenceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub vendor: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MaterializedOccurrence {
    /// Pending occurrence for `due_date` of `obligation`
    pub fn from_obligation(
        obligation: &RecurringObligation,
        due_date: NaiveDate,
        grace_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OccurrenceId::new_v7(),
            shop_id: obligation.shop_id,
            category_id: obligation.category_id,
            obligation_id: Some(obligation.id),
            name: obligation.name.clone(),
            description: obligation.description.clone(),
            amount: obligation.amount,
            due_date,
            pay_by: due_date
                .checked_add_days(Days::new(u64::from(grace_days)))
                .unwrap_or(due_date),
            status: OccurrenceStatus::Pending,
            paid_at: None,
            payment_method: obligation.payment_method.clone(),
            vendor: obligation.vendor.clone(),
            notes: Some(format!("Auto-generated from fixed expense: {}", obligation.name)),
            created_at: now,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == OccurrenceStatus::Pending && today > self.pay_by
    }

    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<(), RecurrenceError> {
        if self.status == OccurrenceStatus::Paid {
            return Err(RecurrenceError::AlreadyPaid(self.id));
        }
        self.status = OccurrenceStatus::Paid;
        self.paid_at = Some(at);
        Ok(())
    }
}

/// A one-off expense entered by shop staff
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OccurrenceDraft {
    pub shop_id: ShopId,
    pub category_id: ExpenseCategoryId,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub amount: Money,
    pub due_date: NaiveDate,
    /// Defaults to the due date
    pub pay_by: Option<NaiveDate>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(max = 200))]
    pub vendor: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl OccurrenceDraft {
    pub fn into_occurrence(self, now: DateTime<Utc>) -> Result<MaterializedOccurrence, RecurrenceError> {
        self.validate()?;
        if !self.amount.is_positive() {
            return Err(RecurrenceError::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        let pay_by = self.pay_by.unwrap_or(self.due_date);
        if pay_by < self.due_date {
            return Err(RecurrenceError::Validation(format!(
                "pay-by date {pay_by} precedes due date {}",
                self.due_date
            )));
        }

        Ok(MaterializedOccurrence {
            id: OccurrenceId::new_v7(),
            shop_id: self.shop_id,
            category_id: self.category_id,
            obligation_id: None,
            name: self.name,
            description: self.description,
            amount: self.amount,
            due_date: self.due_date,
            pay_by,
            status: OccurrenceStatus::Pending,
            paid_at: None,
            payment_method: self.payment_method,
            vendor: self.vendor,
            notes: self.notes,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obligation::ObligationDraft;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_generated_occurrence_links_back() {
        let draft = ObligationDraft::monthly(
            ShopId::new(),
            ExpenseCategoryId::new(),
            "Electricity",
            Money::new(dec!(2400), Currency::BDT),
            date(2025, 1, 5),
        );
        let rule = draft.check().unwrap();
        let obligation = draft.into_obligation(rule, Utc::now());

        let occurrence = MaterializedOccurrence::from_obligation(&obligation, date(2025, 1, 5), 7, Utc::now());
        assert_eq!(occurrence.obligation_id, Some(obligation.id));
        assert_eq!(occurrence.pay_by, date(2025, 1, 12));
        assert_eq!(occurrence.status, OccurrenceStatus::Pending);
        assert_eq!(
            occurrence.notes.as_deref(),
            Some("Auto-generated from fixed expense: Electricity")
        );
        assert!(occurrence.is_overdue(date(2025, 1, 13)));
        assert!(!occurrence.is_overdue(date(2025, 1, 12)));
    }

    #[test]
    fn test_mark_paid_twice() {
        let draft = OccurrenceDraft {
            shop_id: ShopId::new(),
            category_id: ExpenseCategoryId::new(),
            name: "Generator fuel".to_string(),
            description: None,
            amount: Money::new(dec!(800), Currency::BDT),
            due_date: date(2025, 2, 1),
            pay_by: None,
            payment_method: Some("cash".to_string()),
            vendor: None,
            notes: None,
        };
        let mut occurrence = draft.into_occurrence(Utc::now()).unwrap();
        assert!(occurrence.obligation_id.is_none());
        assert_eq!(occurrence.pay_by, date(2025, 2, 1));

        let paid_at = Utc::now();
        occurrence.mark_paid(paid_at).unwrap();
        assert!(matches!(occurrence.mark_paid(Utc::now()), Err(RecurrenceError::AlreadyPaid(_))));
        assert_eq!(occurrence.paid_at, Some(paid_at));
    }
}
