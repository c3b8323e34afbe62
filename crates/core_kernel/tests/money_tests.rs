//! Integration tests for Money as used by ledger balances and invoice totals

use core_kernel::{Currency, Money, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::BDT);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_handles_jpy_no_decimals() {
        let m = Money::from_minor(10000, Currency::JPY);
        assert_eq!(m.amount(), dec!(10000));
    }

    #[test]
    fn test_zero_is_neither_positive_nor_negative() {
        let m = Money::zero(Currency::BDT);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }
}

mod display {
    use super::*;

    #[test]
    fn test_taka_display_uses_symbol_and_two_places() {
        let m = Money::new(dec!(1500), Currency::BDT);
        assert_eq!(m.to_string(), "৳ 1500.00");
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::new(dec!(10.4567), Currency::BDT).round_to_currency();
        assert_eq!(m.amount(), dec!(10.46));
    }
}

mod summing {
    use super::*;

    #[test]
    fn test_sum_of_credit_amounts() {
        let amounts = [
            Money::new(dec!(500), Currency::BDT),
            Money::new(dec!(300), Currency::BDT),
        ];
        let total = Money::sum(Currency::BDT, &amounts).unwrap();
        assert_eq!(total, Money::new(dec!(800), Currency::BDT));
    }

    #[test]
    fn test_sum_rejects_foreign_currency() {
        let amounts = [
            Money::new(dec!(500), Currency::BDT),
            Money::new(dec!(5), Currency::USD),
        ];
        let result = Money::sum(Currency::BDT, &amounts);
        assert_eq!(
            result,
            Err(MoneyError::CurrencyMismatch("BDT".to_string(), "USD".to_string()))
        );
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        let a = Money::new(dec!(100), Currency::BDT);
        let b = Money::new(dec!(250), Currency::BDT);
        assert!(a.checked_sub(&b).unwrap().is_negative());
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_money_json_roundtrip_keeps_currency_code() {
        let m = Money::new(dec!(42.50), Currency::BDT);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"BDT\""));
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
