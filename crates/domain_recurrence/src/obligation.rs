//! Recurring obligations
//!
//! A recurring obligation ("fixed expense") is a template such as monthly
//! rent or a weekly salary. The engine turns each due date of its schedule
//! into a payable occurrence.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{ExpenseCategoryId, Money, ObligationId, ShopId};

use crate::cadence::{Cadence, NextDue, RecurrenceRule};
use crate::error::RecurrenceError;

/// A recurring financial obligation of a shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringObligation {
    pub id: ObligationId,
    pub shop_id: ShopId,
    pub category_id: ExpenseCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub amount: Money,
    pub rule: RecurrenceRule,
    /// Due date of the most recent materialized occurrence
    pub last_materialized: Option<NaiveDate>,
    pub next_due: NextDue,
    /// Inactive obligations keep their schedule but are never selected
    pub active: bool,
    pub vendor: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringObligation {
    /// True when a tick on `as_of` should materialize this obligation
    ///
    /// The end date bounds the due date, not the tick date, so a tick that
    /// runs after the end date still picks up the last date inside it.
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.active
            && self.next_due.is_due_by(as_of)
            && self
                .next_due
                .date()
                .zip(self.rule.end_date)
                .map_or(true, |(due, end)| due <= end)
    }

    /// Schedule to use after the rule changed
    ///
    /// Resumes after the last materialized date so an edit never produces a
    /// second occurrence for a date already paid out.
    pub fn rescheduled(&self) -> NextDue {
        match self.last_materialized {
            Some(last) => self.rule.next_after(last),
            None => self.rule.first_due(),
        }
    }
}

/// Create or edit request for a recurring obligation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObligationDraft {
    /// Set to edit an existing obligation
    pub id: Option<ObligationId>,
    pub shop_id: ShopId,
    pub category_id: ExpenseCategoryId,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub amount: Money,
    pub cadence: Cadence,
    #[validate(range(min = 1, max = 1000))]
    pub interval: u32,
    #[validate(range(min = 1, max = 31))]
    pub day_of_month: Option<u32>,
    pub day_of_week: Option<Weekday>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub vendor: Option<String>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub active: bool,
}

impl ObligationDraft {
    /// A monthly obligation starting on `start_date`, active, interval 1
    pub fn monthly(
        shop_id: ShopId,
        category_id: ExpenseCategoryId,
        name: impl Into<String>,
        amount: Money,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            shop_id,
            category_id,
            name: name.into(),
            description: None,
            amount,
            cadence: Cadence::Monthly,
            interval: 1,
            day_of_month: None,
            day_of_week: None,
            start_date,
            end_date: None,
            vendor: None,
            payment_method: None,
            notes: None,
            active: true,
        }
    }

    pub fn rule(&self) -> RecurrenceRule {
        RecurrenceRule {
            cadence: self.cadence,
            interval: self.interval,
            day_of_month: self.day_of_month,
            day_of_week: self.day_of_week,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    /// Field validation plus the rule's own consistency checks
    pub fn check(&self) -> Result<RecurrenceRule, RecurrenceError> {
        self.validate()?;
        if !self.amount.is_positive() {
            return Err(RecurrenceError::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        let rule = self.rule();
        rule.validate()?;
        Ok(rule)
    }

    /// Builds a new obligation scheduled at the rule's first due date
    pub fn into_obligation(self, rule: RecurrenceRule, now: DateTime<Utc>) -> RecurringObligation {
        let next_due = rule.first_due();
        RecurringObligation {
            id: self.id.unwrap_or_else(ObligationId::new_v7),
            shop_id: self.shop_id,
            category_id: self.category_id,
            name: self.name,
            description: self.description,
            amount: self.amount,
            rule,
            last_materialized: None,
            next_due,
            active: self.active,
            vendor: self.vendor,
            payment_method: self.payment_method,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the draft to an existing obligation
    ///
    /// History (`last_materialized`, `created_at`) is kept. The schedule is
    /// recomputed only when the rule itself changed.
    pub fn apply_to(self, existing: &RecurringObligation, rule: RecurrenceRule, now: DateTime<Utc>) -> RecurringObligation {
        let mut updated = existing.clone();
        let rule_changed = updated.rule != rule;
        updated.shop_id = self.shop_id;
        updated.category_id = self.category_id;
        updated.name = self.name;
        updated.description = self.description;
        updated.amount = self.amount;
        updated.rule = rule;
        updated.active = self.active;
        updated.vendor = self.vendor;
        updated.payment_method = self.payment_method;
        updated.notes = self.notes;
        updated.updated_at = now;
        if rule_changed {
            updated.next_due = updated.rescheduled();
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rent() -> ObligationDraft {
        ObligationDraft::monthly(
            ShopId::new(),
            ExpenseCategoryId::new(),
            "Shop rent",
            Money::new(dec!(15000), Currency::BDT),
            date(2024, 1, 31),
        )
    }

    #[test]
    fn test_new_obligation_starts_at_first_due() {
        let draft = rent();
        let rule = draft.check().unwrap();
        let obligation = draft.into_obligation(rule, Utc::now());
        assert_eq!(obligation.next_due, NextDue::Scheduled(date(2024, 1, 31)));
        assert!(obligation.last_materialized.is_none());
        assert!(obligation.is_due(date(2024, 2, 15)));
        assert!(!obligation.is_due(date(2024, 1, 30)));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut draft = rent();
        draft.name = String::new();
        assert!(matches!(draft.check(), Err(RecurrenceError::Validation(_))));
    }

    #[test]
    fn test_day_of_month_out_of_range_rejected() {
        let mut draft = rent();
        draft.day_of_month = Some(0);
        assert!(draft.check().is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut draft = rent();
        draft.amount = Money::new(dec!(-1), Currency::BDT);
        assert!(matches!(draft.check(), Err(RecurrenceError::Validation(_))));
    }

    #[test]
    fn test_rule_edit_resumes_after_last_materialized() {
        let draft = rent();
        let rule = draft.check().unwrap();
        let mut obligation = draft.clone().into_obligation(rule, Utc::now());
        obligation.last_materialized = Some(date(2024, 3, 31));
        obligation.next_due = NextDue::Scheduled(date(2024, 4, 30));

        let mut edit = draft;
        edit.day_of_month = Some(15);
        let rule = edit.check().unwrap();
        let updated = edit.apply_to(&obligation, rule, Utc::now());

        assert_eq!(updated.next_due, NextDue::Scheduled(date(2024, 4, 15)));
        assert_eq!(updated.last_materialized, Some(date(2024, 3, 31)));
    }

    #[test]
    fn test_rename_keeps_schedule() {
        let draft = rent();
        let rule = draft.check().unwrap();
        let mut obligation = draft.clone().into_obligation(rule, Utc::now());
        obligation.next_due = NextDue::Scheduled(date(2024, 4, 30));

        let mut edit = draft;
        edit.name = "Warehouse rent".to_string();
        let rule = edit.check().unwrap();
        let updated = edit.apply_to(&obligation, rule, Utc::now());

        assert_eq!(updated.name, "Warehouse rent");
        assert_eq!(updated.next_due, NextDue::Scheduled(date(2024, 4, 30)));
    }

    #[test]
    fn test_last_date_before_end_stays_due_after_end() {
        let mut draft = rent();
        draft.end_date = Some(date(2024, 2, 10));
        let rule = draft.check().unwrap();
        let mut obligation = draft.into_obligation(rule, Utc::now());
        assert!(obligation.is_due(date(2024, 2, 10)));
        assert!(obligation.is_due(date(2024, 6, 1)));

        obligation.next_due = NextDue::Scheduled(date(2024, 2, 29));
        assert!(!obligation.is_due(date(2024, 6, 1)));

        obligation.next_due = NextDue::Exhausted;
        assert!(!obligation.is_due(date(2024, 6, 1)));
    }
}
