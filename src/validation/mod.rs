use std::fmt;

pub const TRANSACTION_ID_MAX_LEN: usize = 100;
pub const GATEWAY_MAX_LEN: usize = 50;
pub const PAYMENT_MODE_MAX_LEN: usize = 50;
pub const GATEWAY_TRANSACTION_ID_MAX_LEN: usize = 200;

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

/// Identifiers are stored verbatim, so anything `sanitize_string` would
/// rewrite is rejected instead of silently altered.
pub fn validate_identifier(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, max_len)?;

    if value.chars().any(|ch| ch.is_control() || ch.is_whitespace()) {
        return Err(ValidationError::new(
            field,
            "must not contain whitespace or control characters",
        ));
    }

    Ok(())
}

pub fn validate_transaction_id(transaction_id: &str) -> ValidationResult {
    validate_identifier("transaction_id", transaction_id, TRANSACTION_ID_MAX_LEN)
}

pub fn validate_gateway_transaction_id(gateway_transaction_id: &str) -> ValidationResult {
    validate_identifier(
        "gateway_transaction_id",
        gateway_transaction_id,
        GATEWAY_TRANSACTION_ID_MAX_LEN,
    )
}

/// Gateways are an open set; only the shape is checked. Returns the sanitized name.
pub fn normalize_gateway(gateway: &str) -> Result<String, ValidationError> {
    let gateway = sanitize_string(gateway);
    validate_required("gateway", &gateway)?;
    validate_max_len("gateway", &gateway, GATEWAY_MAX_LEN)?;
    Ok(gateway)
}

pub fn normalize_payment_mode(payment_mode: &str) -> Result<String, ValidationError> {
    let payment_mode = sanitize_string(payment_mode);
    validate_required("payment_mode", &payment_mode)?;
    validate_max_len("payment_mode", &payment_mode, PAYMENT_MODE_MAX_LEN)?;
    Ok(payment_mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
        assert!(validate_max_len("field", "₹₹₹", 3).is_ok());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_transaction_id() {
        assert!(validate_transaction_id("txn_001").is_ok());
        assert!(validate_transaction_id(&"a".repeat(100)).is_ok());
        assert!(validate_transaction_id(&"a".repeat(101)).is_err());
        assert!(validate_transaction_id("").is_err());
        assert!(validate_transaction_id("txn 001").is_err());
        assert!(validate_transaction_id(" txn_001").is_err());
    }

    #[test]
    fn validates_gateway_transaction_id() {
        assert!(validate_gateway_transaction_id("pay_29QQoUBi66xm2f").is_ok());
        assert!(validate_gateway_transaction_id(&"g".repeat(201)).is_err());
    }

    #[test]
    fn normalizes_open_gateway_names() {
        assert_eq!(normalize_gateway(" Razorpay ").unwrap(), "Razorpay");
        assert_eq!(normalize_gateway("SomeNewGateway").unwrap(), "SomeNewGateway");
        assert!(normalize_gateway("  ").is_err());
        assert!(normalize_gateway(&"G".repeat(51)).is_err());
    }

    #[test]
    fn normalizes_payment_mode() {
        assert_eq!(normalize_payment_mode("upi").unwrap(), "upi");
        assert!(normalize_payment_mode("").is_err());
    }
}
