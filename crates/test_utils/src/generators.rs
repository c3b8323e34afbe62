//! Property-Based Test Generators
//!
//! Proptest strategies for ledger data that respects domain invariants:
//! credit amounts are positive and rules always validate.

use chrono::{Duration, NaiveDate, Weekday};
use core_kernel::{Currency, Money};
use domain_recurrence::{Cadence, RecurrenceRule};
use proptest::prelude::*;

/// Strategy for positive BDT amounts between 0.01 and 100,000.00
pub fn bdt_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..10_000_000i64).prop_map(|minor| Money::from_minor(minor, Currency::BDT))
}

/// Strategy for a month's worth of credit amounts
pub fn bdt_amounts_strategy(max_len: usize) -> impl Strategy<Value = Vec<Money>> {
    proptest::collection::vec(bdt_money_strategy(), 0..=max_len)
}

/// Dates between 2020-01-01 and roughly 2030
fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650i64).prop_map(|days| base_date() + Duration::days(days))
}

fn weekday_strategy() -> impl Strategy<Value = Weekday> {
    (0u8..7u8).prop_map(|n| match n {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    })
}

fn cadence_strategy() -> impl Strategy<Value = Cadence> {
    prop_oneof![
        Just(Cadence::Daily),
        Just(Cadence::Weekly),
        Just(Cadence::Monthly),
        Just(Cadence::Yearly),
    ]
}

/// Strategy for rules that pass `RecurrenceRule::validate`
///
/// The anchor day only applies to monthly rules and the weekday only to
/// weekly ones. End dates, when present, fall on or after the start.
pub fn rule_strategy() -> impl Strategy<Value = RecurrenceRule> {
    (
        cadence_strategy(),
        1u32..=3u32,
        date_strategy(),
        proptest::option::of(1u32..=31u32),
        proptest::option::of(weekday_strategy()),
        proptest::option::of(0i64..1500i64),
    )
        .prop_map(|(cadence, interval, start, dom, dow, span)| {
            let mut rule = RecurrenceRule::new(cadence, interval, start);
            if cadence == Cadence::Monthly {
                rule.day_of_month = dom;
            }
            if cadence == Cadence::Weekly {
                rule.day_of_week = dow;
            }
            rule.end_date = span.map(|days| start + Duration::days(days));
            rule
        })
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn bdt_money_is_always_positive(money in bdt_money_strategy()) {
            prop_assert!(money.is_positive());
            prop_assert_eq!(money.currency(), Currency::BDT);
        }

        #[test]
        fn generated_rules_validate(rule in rule_strategy()) {
            prop_assert!(rule.validate().is_ok());
        }

        #[test]
        fn generated_series_stays_within_bounds(rule in rule_strategy()) {
            for date in rule.occurrences().take(24) {
                prop_assert!(date >= rule.start_date);
                if let Some(end) = rule.end_date {
                    prop_assert!(date <= end);
                }
            }
        }
    }
}
