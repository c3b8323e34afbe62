//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the ledger. Dates sit around the 2024 leap
//! year so month-end clamping is easy to exercise.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{Currency, CustomerId, ExpenseCategoryId, Money, ShopId};
use domain_credit::CustomerContact;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn bdt(amount: Decimal) -> Money {
        Money::new(amount, Currency::BDT)
    }

    /// A typical counter purchase on credit
    pub fn bdt_500() -> Money {
        Self::bdt(dec!(500))
    }

    /// Monthly shop rent
    pub fn bdt_rent() -> Money {
        Self::bdt(dec!(15000))
    }

    pub fn bdt_zero() -> Money {
        Money::zero(Currency::BDT)
    }

    /// An amount in a currency other than the ledger's
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Panics on an invalid date
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    /// Anchor of a month-end series
    pub fn jan_31_2024() -> NaiveDate {
        Self::date(2024, 1, 31)
    }

    pub fn leap_day_2024() -> NaiveDate {
        Self::date(2024, 2, 29)
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn customer_id() -> CustomerId {
        CustomerId::new()
    }

    pub fn shop_id() -> ShopId {
        ShopId::new()
    }

    pub fn category_id() -> ExpenseCategoryId {
        ExpenseCategoryId::new()
    }
}

/// Fixture for customer contact details
pub struct ContactFixtures;

impl ContactFixtures {
    /// A customer reachable by email and SMS
    pub fn full(customer_id: CustomerId) -> CustomerContact {
        CustomerContact {
            customer_id,
            full_name: "Karim Hossain".to_string(),
            email: Some("karim@example.com".to_string()),
            phone_number: Some("+8801712345678".to_string()),
        }
    }

    pub fn email_only(customer_id: CustomerId) -> CustomerContact {
        CustomerContact {
            phone_number: None,
            ..Self::full(customer_id)
        }
    }

    pub fn unreachable(customer_id: CustomerId) -> CustomerContact {
        CustomerContact {
            email: None,
            phone_number: None,
            ..Self::full(customer_id)
        }
    }
}
