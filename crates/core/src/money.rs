//! Robust parsing of vendor-formatted monetary values.
//!
//! The distributor's price fields arrive as raw numbers, `"1,234.56"`,
//! `"1.234,56"`, `"$999.00 MXN"` and every combination in between, so the
//! parser strips currency tokens and disambiguates thousands/decimal
//! separators before converting.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Currency symbols and codes stripped before numeric parsing.
static CURRENCY_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"(?i)\s*(mxn|usd?|\$|eur|€|dlls?|\bpesos?\b)\s*").unwrap()
});

/// Round to two decimals, the currency unit used at each commercial step.
#[must_use]
pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// Parse a monetary value out of an untyped vendor JSON field.
///
/// Numbers are returned as-is; strings go through [`parse_money_str`].
/// Anything else (null, arrays, objects, booleans) is not a number.
#[must_use]
pub fn parse_money(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_money_str(s),
        _ => None,
    }
}

/// Parse a currency-formatted string into a finite `f64`.
///
/// Separator disambiguation:
/// - both `,` and `.` present: whichever appears last is the decimal
///   point, the other is a thousands separator and is stripped;
/// - only `,` present: decimal comma (only the first comma converts;
///   later commas are dropped by the character filter);
/// - only `.` or neither: commas stripped as thousands separators.
///
/// Idempotent over its own output: re-parsing the canonical rendering of a
/// parsed value yields the same number.
#[must_use]
pub fn parse_money_str(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let stripped = CURRENCY_TOKENS.replace_all(trimmed, "");
    let has_comma = stripped.contains(',');
    let has_dot = stripped.contains('.');

    let normalized = if has_comma && has_dot {
        if stripped.rfind(',') > stripped.rfind('.') {
            stripped.replace('.', "").replacen(',', ".", 1)
        } else {
            stripped.replace(',', "")
        }
    } else if has_comma {
        stripped.replacen(',', ".", 1)
    } else {
        stripped.replace(',', "")
    };

    let cleaned: String = normalized
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'))
        .collect();

    let n: f64 = cleaned.parse().ok()?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_money(&json!(42.5)), Some(42.5));
        assert_eq!(parse_money(&json!(0)), Some(0.0));
    }

    #[test]
    fn test_parse_rejects_non_numeric_shapes() {
        assert_eq!(parse_money(&Value::Null), None);
        assert_eq!(parse_money(&json!(true)), None);
        assert_eq!(parse_money(&json!([1, 2])), None);
        assert_eq!(parse_money(&json!({"x": 1})), None);
    }

    #[test]
    fn test_parse_currency_tokens_stripped() {
        assert_eq!(parse_money_str("$1,234.56 MXN"), Some(1234.56));
        assert_eq!(parse_money_str("999.00 USD"), Some(999.0));
        assert_eq!(parse_money_str("€15,90"), Some(15.9));
        assert_eq!(parse_money_str("120 pesos"), Some(120.0));
        assert_eq!(parse_money_str("75.50 dlls"), Some(75.5));
    }

    #[test]
    fn test_parse_european_separators() {
        assert_eq!(parse_money_str("1.234,56"), Some(1234.56));
        assert_eq!(parse_money_str("1,234"), Some(1.234));
    }

    #[test]
    fn test_parse_repeated_commas_keep_first_as_decimal() {
        assert_eq!(parse_money_str("1,234,56"), Some(1.234_56));
    }

    #[test]
    fn test_parse_us_separators() {
        assert_eq!(parse_money_str("1,234.56"), Some(1234.56));
        assert_eq!(parse_money_str("12,345,678.9"), Some(12_345_678.9));
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert_eq!(parse_money_str(""), None);
        assert_eq!(parse_money_str("   "), None);
        assert_eq!(parse_money_str("n/a"), None);
        assert_eq!(parse_money_str("$"), None);
    }

    #[test]
    fn test_parse_idempotent_over_canonical_output() {
        for raw in ["$1,234.56 MXN", "1.234,56", "999", "15,9"] {
            let first = parse_money_str(raw).expect("valid monetary string");
            let second = parse_money_str(&first.to_string()).expect("canonical rendering");
            assert!((first - second).abs() < f64::EPSILON, "raw: {raw}");
        }
    }

    #[test]
    fn test_round2() {
        assert!((round2(1391.999_6) - 1392.0).abs() < f64::EPSILON);
        assert!((round2(0.005) - 0.01).abs() < f64::EPSILON);
    }
}
