//! Test Data Builders
//!
//! Builders for the requests the ledger services accept. Tests set only the
//! fields they care about; everything else gets a sensible default.

use chrono::{NaiveDate, Weekday};
use core_kernel::{CustomerId, Money, ObligationId, PosTransactionId, ShopId};
use domain_credit::{CreditKind, OpenCredit};
use domain_recurrence::{Cadence, ObligationDraft, OccurrenceDraft};

use crate::fixtures::{IdFixtures, MoneyFixtures, TemporalFixtures};

/// Builder for `OpenCredit` requests
pub struct OpenCreditBuilder {
    customer_id: CustomerId,
    shop_id: ShopId,
    amount: Money,
    kind: CreditKind,
    description: String,
    originating_transaction: Option<PosTransactionId>,
}

impl Default for OpenCreditBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenCreditBuilder {
    /// A 500 BDT purchase by a fresh customer at a fresh shop
    pub fn new() -> Self {
        Self {
            customer_id: IdFixtures::customer_id(),
            shop_id: IdFixtures::shop_id(),
            amount: MoneyFixtures::bdt_500(),
            kind: CreditKind::Purchase,
            description: "Groceries".to_string(),
            originating_transaction: None,
        }
    }

    pub fn for_pair(mut self, customer_id: CustomerId, shop_id: ShopId) -> Self {
        self.customer_id = customer_id;
        self.shop_id = shop_id;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn build(self) -> OpenCredit {
        OpenCredit {
            customer_id: self.customer_id,
            shop_id: self.shop_id,
            amount: self.amount,
            kind: self.kind,
            description: self.description,
            originating_transaction: self.originating_transaction,
        }
    }
}

/// Builder for `ObligationDraft`
///
/// Defaults to monthly rent of 15000 BDT anchored on 2024-01-31.
pub struct ObligationDraftBuilder {
    draft: ObligationDraft,
}

impl Default for ObligationDraftBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ObligationDraftBuilder {
    pub fn new() -> Self {
        Self {
            draft: ObligationDraft::monthly(
                IdFixtures::shop_id(),
                IdFixtures::category_id(),
                "Shop rent",
                MoneyFixtures::bdt_rent(),
                TemporalFixtures::jan_31_2024(),
            ),
        }
    }

    /// Turns the draft into an edit of an existing obligation
    pub fn editing(mut self, id: ObligationId) -> Self {
        self.draft.id = Some(id);
        self
    }

    pub fn for_shop(mut self, shop_id: ShopId) -> Self {
        self.draft.shop_id = shop_id;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.draft.amount = amount;
        self
    }

    pub fn with_cadence(mut self, cadence: Cadence) -> Self {
        self.draft.cadence = cadence;
        self
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.draft.interval = interval;
        self
    }

    pub fn on_day_of_month(mut self, day: u32) -> Self {
        self.draft.day_of_month = Some(day);
        self
    }

    pub fn on_weekday(mut self, day: Weekday) -> Self {
        self.draft.day_of_week = Some(day);
        self
    }

    pub fn starting(mut self, start_date: NaiveDate) -> Self {
        self.draft.start_date = start_date;
        self
    }

    pub fn ending(mut self, end_date: NaiveDate) -> Self {
        self.draft.end_date = Some(end_date);
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.draft.vendor = Some(vendor.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.draft.active = false;
        self
    }

    pub fn build(self) -> ObligationDraft {
        self.draft
    }
}

/// Builder for one-off expenses
pub struct OccurrenceDraftBuilder {
    draft: OccurrenceDraft,
}

impl OccurrenceDraftBuilder {
    /// A pending expense due on `due_date` and payable the same day
    pub fn due(shop_id: ShopId, due_date: NaiveDate) -> Self {
        Self {
            draft: OccurrenceDraft {
                shop_id,
                category_id: IdFixtures::category_id(),
                name: "Generator fuel".to_string(),
                description: None,
                amount: MoneyFixtures::bdt_500(),
                due_date,
                pay_by: None,
                payment_method: None,
                vendor: None,
                notes: None,
            },
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.draft.amount = amount;
        self
    }

    pub fn pay_by(mut self, date: NaiveDate) -> Self {
        self.draft.pay_by = Some(date);
        self
    }

    pub fn paid_with(mut self, method: impl Into<String>) -> Self {
        self.draft.payment_method = Some(method.into());
        self
    }

    pub fn build(self) -> OccurrenceDraft {
        self.draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_obligation_passes_checks() {
        let draft = ObligationDraftBuilder::new().build();
        let rule = draft.check().unwrap();
        assert_eq!(rule.cadence, Cadence::Monthly);
        assert_eq!(rule.start_date, TemporalFixtures::jan_31_2024());
    }

    #[test]
    fn test_weekly_builder_sets_weekday() {
        let draft = ObligationDraftBuilder::new()
            .with_cadence(Cadence::Weekly)
            .on_weekday(Weekday::Fri)
            .build();
        assert_eq!(draft.rule().day_of_week, Some(Weekday::Fri));
    }

    #[test]
    fn test_open_credit_pair() {
        let (customer, shop) = (IdFixtures::customer_id(), IdFixtures::shop_id());
        let request = OpenCreditBuilder::new().for_pair(customer, shop).build();
        assert_eq!(request.customer_id, customer);
        assert_eq!(request.shop_id, shop);
        assert_eq!(request.kind, CreditKind::Purchase);
    }
}
