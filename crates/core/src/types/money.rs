//! Decimal money and quantity coercion.
//!
//! Prices arrive from the catalog API as JSON numbers or numeric strings, and
//! persisted carts may have been written by older clients. These helpers turn
//! any JSON value into a usable amount without ever failing: malformed input
//! becomes zero (prices) or `None` (quantities) so the caller can apply its
//! own clamping rule.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

/// Coerce a JSON value into a non-negative decimal amount.
///
/// Numbers and numeric strings are accepted; anything else, including
/// negative amounts, yields [`Decimal::ZERO`].
///
/// ```
/// use rust_decimal::Decimal;
/// use serde_json::json;
/// use shopdesk_core::lenient_decimal;
///
/// assert_eq!(lenient_decimal(&json!("19.90")), Decimal::new(1990, 2));
/// assert_eq!(lenient_decimal(&json!(5)), Decimal::new(5, 0));
/// assert_eq!(lenient_decimal(&json!("n/a")), Decimal::ZERO);
/// ```
#[must_use]
pub fn lenient_decimal(value: &Value) -> Decimal {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| Decimal::from_str(&n.to_string()).ok())
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };

    parsed
        .filter(|amount| !amount.is_sign_negative())
        .unwrap_or(Decimal::ZERO)
}

/// Coerce a JSON value into a whole quantity of at least one.
///
/// Fractional amounts are truncated. Returns `None` for non-numeric input and
/// for anything that truncates to less than one.
#[must_use]
pub fn lenient_quantity(value: &Value) -> Option<u32> {
    let amount = match value {
        Value::Number(n) => n
            .as_u64()
            .map(Decimal::from)
            .or_else(|| Decimal::from_str(&n.to_string()).ok()),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }?;

    amount.trunc().to_u32().filter(|quantity| *quantity >= 1)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_lenient_decimal() {
        assert_eq!(lenient_decimal(&json!(10)), Decimal::new(10, 0));
        assert_eq!(lenient_decimal(&json!(12.5)), Decimal::new(125, 1));
        assert_eq!(lenient_decimal(&json!(" 3.20 ")), Decimal::new(320, 2));
        assert_eq!(lenient_decimal(&json!(-4)), Decimal::ZERO);
        assert_eq!(lenient_decimal(&json!(null)), Decimal::ZERO);
        assert_eq!(lenient_decimal(&json!({"amount": 1})), Decimal::ZERO);
    }

    #[test]
    fn test_lenient_quantity() {
        assert_eq!(lenient_quantity(&json!(3)), Some(3));
        assert_eq!(lenient_quantity(&json!("2")), Some(2));
        assert_eq!(lenient_quantity(&json!(2.9)), Some(2));
        assert_eq!(lenient_quantity(&json!(0)), None);
        assert_eq!(lenient_quantity(&json!(-1)), None);
        assert_eq!(lenient_quantity(&json!(0.5)), None);
        assert_eq!(lenient_quantity(&json!("abc")), None);
        assert_eq!(lenient_quantity(&json!(null)), None);
    }
}
