//! Validation of user-entered quantities and prices
//!
//! Form input uses `.` as the thousands separator and `,` as the decimal
//! separator (`1.234,56`). Values are parsed into exact decimals so that stock
//! levels and money never pick up binary rounding error.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("invalid quantity")]
    InvalidQuantity,

    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
}

/// Parse a localized decimal string (`"1.234,56"`) into `1234.56`.
///
/// Thousands separators are stripped first and the decimal comma is then
/// replaced, so `"1.5"` reads as fifteen. Every accepted value is strictly
/// positive.
pub fn parse_localized_decimal(raw: &str) -> Result<Decimal, QuantityError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QuantityError::InvalidQuantity);
    }

    let canonical = trimmed.replace('.', "").replace(',', ".");
    if !is_plain_decimal(&canonical) {
        return Err(QuantityError::InvalidQuantity);
    }

    let value: Decimal = canonical
        .parse()
        .map_err(|_| QuantityError::InvalidQuantity)?;

    if value <= Decimal::ZERO {
        return Err(QuantityError::NonPositiveQuantity);
    }
    Ok(value)
}

// Decimal::from_str also accepts `_` digit separators, which are not valid form input.
fn is_plain_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    let mut seen_point = false;
    let mut seen_digit = false;

    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_point => seen_point = true,
            _ => return false,
        }
    }
    seen_digit
}

/// Format a decimal the way it is entered in forms (`1234.5` -> `"1.234,5"`)
pub fn format_localized_decimal(value: Decimal) -> String {
    let text = value.normalize().to_string();
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    match fraction {
        Some(f) => format!("{}{},{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_thousands_and_decimal_comma() {
        assert_eq!(parse_localized_decimal("1.234,56"), Ok(dec("1234.56")));
        assert_eq!(parse_localized_decimal("2,000"), Ok(dec("2")));
        assert_eq!(parse_localized_decimal("10,00"), Ok(dec("10")));
        assert_eq!(parse_localized_decimal("1.000.000"), Ok(dec("1000000")));
    }

    #[test]
    fn test_parse_plain_integers() {
        assert_eq!(parse_localized_decimal("1"), Ok(Decimal::ONE));
        assert_eq!(parse_localized_decimal(" 250 "), Ok(dec("250")));
    }

    #[test]
    fn test_dot_is_thousands_separator() {
        assert_eq!(parse_localized_decimal("1.5"), Ok(dec("15")));
    }

    #[test]
    fn test_parse_non_positive() {
        assert_eq!(parse_localized_decimal("0"), Err(QuantityError::NonPositiveQuantity));
        assert_eq!(parse_localized_decimal("0,00"), Err(QuantityError::NonPositiveQuantity));
        assert_eq!(parse_localized_decimal("-3"), Err(QuantityError::NonPositiveQuantity));
    }

    #[test]
    fn test_parse_invalid() {
        for raw in ["abc", "", "   ", "1,2,3", "12a", "1_000", ",", "--1", "1e3"] {
            assert_eq!(
                parse_localized_decimal(raw),
                Err(QuantityError::InvalidQuantity),
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_format_localized_decimal() {
        assert_eq!(format_localized_decimal(dec("1234.56")), "1.234,56");
        assert_eq!(format_localized_decimal(dec("999")), "999");
        assert_eq!(format_localized_decimal(dec("1000000")), "1.000.000");
        assert_eq!(format_localized_decimal(dec("2.500")), "2,5");
        assert_eq!(format_localized_decimal(dec("-1234")), "-1.234");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Formatting a positive value and parsing it back is lossless
        #[test]
        fn prop_format_then_parse(n in 1i64..=10_000_000_000i64, scale in 0u32..=4) {
            let value = Decimal::new(n, scale);
            let text = format_localized_decimal(value);
            prop_assert_eq!(parse_localized_decimal(&text), Ok(value));
        }

        /// Every parsed value is strictly positive
        #[test]
        fn prop_parsed_values_are_positive(raw in "[-+]?[0-9.]{1,12}(,[0-9]{0,4})?") {
            if let Ok(value) = parse_localized_decimal(&raw) {
                prop_assert!(value > Decimal::ZERO);
            }
        }
    }
}
