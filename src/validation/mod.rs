use bigdecimal::BigDecimal;
use std::fmt;

pub const ACCOUNT_NUMBER_LEN: usize = 10;
pub const ISSUER_PREFIX_LEN: usize = 3;
pub const NATIONAL_ID_LEN: usize = 13;
pub const NAME_MAX_LEN: usize = 100;
pub const NAME_PREFIX_MAX_LEN: usize = 20;
pub const STAFF_ID_MAX_LEN: usize = 64;

/// Decimal places kept for money and for rates, matching the NUMERIC columns
/// they are stored in.
pub const MONEY_SCALE: i64 = 2;
pub const RATE_SCALE: i64 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_digits(field: &'static str, value: &str, len: usize) -> ValidationResult {
    if value.len() != len || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(
            field,
            format!("must be exactly {} digits", len),
        ));
    }

    Ok(())
}

pub fn validate_account_number(number: &str) -> ValidationResult {
    validate_digits("account_number", number, ACCOUNT_NUMBER_LEN)
}

pub fn validate_national_id(national_id: &str) -> ValidationResult {
    validate_digits("national_id", national_id, NATIONAL_ID_LEN)
}

pub fn validate_name(field: &'static str, value: &str) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, NAME_MAX_LEN)
}

pub fn validate_staff_id(staff_id: &str) -> ValidationResult {
    validate_required("staff_id", staff_id)?;
    validate_max_len("staff_id", staff_id, STAFF_ID_MAX_LEN)
}

/// Significant decimal places; trailing zeros do not count.
pub fn decimal_places(value: &BigDecimal) -> i64 {
    let (_, scale) = value.normalized().as_bigint_and_exponent();
    scale.max(0)
}

fn validate_scale(field: &'static str, value: &BigDecimal, max_scale: i64) -> ValidationResult {
    if decimal_places(value) > max_scale {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} decimal places", max_scale),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    validate_scale("amount", amount, MONEY_SCALE)
}

/// Annual rates are fractions: 0.02 means 2%.
pub fn validate_rate(rate: &BigDecimal) -> ValidationResult {
    if rate < &BigDecimal::from(0) || rate > &BigDecimal::from(1) {
        return Err(ValidationError::new("rate", "must be between 0 and 1"));
    }

    validate_scale("rate", rate, RATE_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
        assert!(validate_max_len("field", "สมชาย", 5).is_ok());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_account_number() {
        assert!(validate_account_number("1010000001").is_ok());
        assert!(validate_account_number("101000000").is_err());
        assert!(validate_account_number("10100000012").is_err());
        assert!(validate_account_number("10100A0001").is_err());
    }

    #[test]
    fn validates_national_id() {
        assert!(validate_national_id("1103700012345").is_ok());
        assert!(validate_national_id("110370001234").is_err());
        assert!(validate_national_id("11037000123-5").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
    }

    #[test]
    fn amounts_are_limited_to_cents() {
        assert!(validate_positive_amount(&BigDecimal::from_str("0.01").unwrap()).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from_str("12.500").unwrap()).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from_str("0.001").unwrap()).is_err());
        assert!(validate_positive_amount(&BigDecimal::from_str("100.005").unwrap()).is_err());
    }

    #[test]
    fn rates_are_limited_to_six_places() {
        assert!(validate_rate(&BigDecimal::from_str("0.012345").unwrap()).is_ok());
        assert!(validate_rate(&BigDecimal::from_str("0.0123450").unwrap()).is_ok());
        assert!(validate_rate(&BigDecimal::from_str("0.0123456").unwrap()).is_err());
    }

    #[test]
    fn counts_significant_decimal_places() {
        assert_eq!(decimal_places(&BigDecimal::from_str("1.2300").unwrap()), 2);
        assert_eq!(decimal_places(&BigDecimal::from(1500)), 0);
        assert_eq!(decimal_places(&BigDecimal::from(0)), 0);
    }

    #[test]
    fn validates_rate_range() {
        assert!(validate_rate(&BigDecimal::from(0)).is_ok());
        assert!(validate_rate(&BigDecimal::from(1)).is_ok());
        assert!(validate_rate(&BigDecimal::from_str("0.0125").unwrap()).is_ok());
        assert!(validate_rate(&BigDecimal::from_str("-0.01").unwrap()).is_err());
        assert!(validate_rate(&BigDecimal::from_str("1.0001").unwrap()).is_err());
    }

    #[test]
    fn validates_staff_id() {
        assert!(validate_staff_id("staff-0042").is_ok());
        assert!(validate_staff_id("").is_err());
        assert!(validate_staff_id(&"s".repeat(65)).is_err());
    }
}
