use bigdecimal::BigDecimal;
use std::fmt;

pub const COUPON_CODE_MAX_LEN: usize = 20;
pub const MAX_LINE_QUANTITY: i32 = 50;

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
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Coupon codes are short upper-case alphanumerics, e.g. `SAVE10`.
pub fn validate_coupon_code(code: &str) -> ValidationResult {
    validate_required("coupon_code", code)?;
    validate_max_len("coupon_code", code, COUPON_CODE_MAX_LEN)?;

    if !code
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "coupon_code",
            "must contain only uppercase letters and digits",
        ));
    }

    Ok(())
}

pub fn validate_quantity(quantity: i32) -> ValidationResult {
    if quantity < 1 || quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::new(
            "quantity",
            format!("must be between 1 and {}", MAX_LINE_QUANTITY),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}
