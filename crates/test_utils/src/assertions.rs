//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that give more meaningful failure
//! messages than bare `assert_eq!`.

use chrono::NaiveDate;
use core_kernel::Money;
use domain_credit::{CreditEntry, Invoice};
use domain_recurrence::MaterializedOccurrence;

/// Asserts that a Money value is positive
pub fn assert_money_positive(money: &Money) {
    assert!(
        money.is_positive(),
        "Expected positive money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that money values sum to a total
///
/// # Panics
///
/// Panics if the currencies differ or the sum doesn't equal the total
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = Money::sum(total.currency(), parts.iter()).expect("Currency mismatch in sum");

    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum.amount(),
        total.amount()
    );
}

/// Asserts that the invoice total equals the sum of its line items
pub fn assert_invoice_balanced(invoice: &Invoice) {
    let amounts: Vec<Money> = invoice.items.iter().map(|item| item.amount).collect();
    assert_money_sum_equals(&amounts, &invoice.total);
}

/// Asserts that the invoice lists exactly these entries, in this order
pub fn assert_invoice_covers(invoice: &Invoice, entries: &[CreditEntry]) {
    let listed: Vec<_> = invoice.items.iter().map(|item| item.source_entry_id).collect();
    let expected: Vec<_> = entries.iter().map(|entry| entry.id).collect();
    assert_eq!(
        listed, expected,
        "Invoice {} lists entries {:?}, expected {:?}",
        invoice.invoice_number, listed, expected
    );
}

/// Asserts that the occurrences fall on exactly these due dates, in order
pub fn assert_due_dates(occurrences: &[MaterializedOccurrence], expected: &[NaiveDate]) {
    let actual: Vec<NaiveDate> = occurrences.iter().map(|o| o.due_date).collect();
    assert_eq!(actual, expected, "Due dates {:?} differ from {:?}", actual, expected);
}

/// Asserts that dates are strictly increasing
pub fn assert_strictly_ascending(dates: &[NaiveDate]) {
    for pair in dates.windows(2) {
        assert!(
            pair[0] < pair[1],
            "Dates not strictly ascending: {} then {}",
            pair[0],
            pair[1]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{MoneyFixtures, TemporalFixtures};
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_sum_equals() {
        let parts = vec![
            MoneyFixtures::bdt(dec!(33.34)),
            MoneyFixtures::bdt(dec!(33.33)),
            MoneyFixtures::bdt(dec!(33.33)),
        ];
        assert_money_sum_equals(&parts, &MoneyFixtures::bdt(dec!(100.00)));
    }

    #[test]
    #[should_panic(expected = "Expected positive money")]
    fn test_assert_money_positive_fails_for_zero() {
        assert_money_positive(&MoneyFixtures::bdt_zero());
    }

    #[test]
    #[should_panic(expected = "not strictly ascending")]
    fn test_repeated_date_is_not_ascending() {
        let d = TemporalFixtures::leap_day_2024();
        assert_strictly_ascending(&[d, d]);
    }
}
