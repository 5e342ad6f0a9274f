use billing_sync::domain::id::IdempotencyKey;
use billing_sync::domain::money::{CurrencyCode, MoneyAmount};
use proptest::prelude::*;
use rust_decimal::Decimal;

proptest! {
    /// MoneyAmount survives roundtrip through cents().
    #[test]
    fn money_amount_roundtrip(cents in 0i64..=i64::MAX) {
        prop_assert_eq!(MoneyAmount::new(cents).unwrap().cents(), cents);
    }

    #[test]
    fn negative_amounts_are_rejected(cents in i64::MIN..0) {
        prop_assert!(MoneyAmount::new(cents).is_err());
    }

    /// checked_add matches i64::checked_add: never silently overflows.
    #[test]
    fn money_add_never_silently_overflows(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX) {
        let result = MoneyAmount::new(a).unwrap().checked_add(MoneyAmount::new(b).unwrap());
        match a.checked_add(b) {
            Some(expected) => prop_assert_eq!(result.unwrap().cents(), expected),
            None => prop_assert!(result.is_none()),
        }
    }

    #[test]
    fn money_mul_never_silently_overflows(a in 0i64..=i64::MAX, qty in 1u32..=u32::MAX) {
        let result = MoneyAmount::new(a).unwrap().checked_mul(qty);
        match a.checked_mul(i64::from(qty)) {
            Some(expected) => prop_assert_eq!(result.unwrap().cents(), expected),
            None => prop_assert!(result.is_none()),
        }
    }

    /// Two-decimal prices convert exactly.
    #[test]
    fn major_units_with_two_decimals_are_exact(cents in 0i64..1_000_000_000_000) {
        let price = Decimal::new(cents, 2);
        prop_assert_eq!(MoneyAmount::from_major(price).unwrap().cents(), cents);
    }

    /// A third decimal rounds half away from zero.
    #[test]
    fn third_decimal_rounds_half_up(mills in 0i64..1_000_000_000_000) {
        let price = Decimal::new(mills, 3);
        let expected = mills / 10 + i64::from(mills % 10 >= 5);
        prop_assert_eq!(MoneyAmount::from_major(price).unwrap().cents(), expected);
    }

    #[test]
    fn currency_codes_are_lowercased(code in "[a-zA-Z]{3}") {
        let currency = CurrencyCode::new(&code).unwrap();
        prop_assert_eq!(currency.as_str(), code.to_ascii_lowercase());
    }

    #[test]
    fn currency_codes_must_have_three_letters(code in "[a-zA-Z]{0,2}|[a-zA-Z]{4,8}|[a-z]{2}[0-9]") {
        prop_assert!(CurrencyCode::new(&code).is_err());
    }

    /// Same scope and parts, same key; moving the part boundary changes it.
    #[test]
    fn idempotency_keys_are_deterministic(
        scope in "[a-z_]{1,12}",
        a in "[a-zA-Z0-9_]{0,16}",
        b in "[a-zA-Z0-9_]{0,16}",
    ) {
        let parts = [a.as_str(), b.as_str()];
        let key = IdempotencyKey::derive(&scope, &parts);
        prop_assert_eq!(&key, &IdempotencyKey::derive(&scope, &parts));
        prop_assert!(key.as_str().starts_with(&scope));

        let joined = format!("{a}{b}");
        prop_assert_ne!(&key, &IdempotencyKey::derive(&scope, &[joined.as_str()]));
        prop_assert_ne!(&key, &IdempotencyKey::derive("OtherScope", &parts));
    }
}
