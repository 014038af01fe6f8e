// /party-tickets/services/ticket-service/src/utils/validator.rs

use once_cell::sync::Lazy;
use regex::Regex;
use crate::utils::error::{AppError, AppResult};

/// Safaricom MSISDN dalam format internasional: 2547XXXXXXXX atau 2541XXXXXXXX
static MSISDN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^254(7|1)\d{8}$").expect("valid MSISDN regex")
});

/// Normalisasi nomor telepon ke format yang diterima Daraja.
///
/// Menerima `0712345678`, `712345678`, `+254712345678`, `254712345678`
/// dengan spasi atau dash di antaranya.
pub fn normalize_phone(raw: &str) -> AppResult<String> {
    let digits: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::ValidationError("Phone number must contain digits only".to_string()));
    }

    let msisdn = if let Some(rest) = digits.strip_prefix('0') {
        format!("254{}", rest)
    } else if digits.len() == 9 {
        format!("254{}", digits)
    } else {
        digits
    };

    if !MSISDN_PATTERN.is_match(&msisdn) {
        return Err(AppError::ValidationError(
            "Phone number must be a valid Safaricom number, e.g. 0712345678".to_string()
        ));
    }

    Ok(msisdn)
}

/// Normalisasi currency code. Browser mengirim `KSH`, disimpan sebagai `KES`.
pub fn normalize_currency(raw: Option<&str>) -> AppResult<String> {
    match raw.map(|c| c.trim().to_uppercase()) {
        None => Ok("KES".to_string()),
        Some(c) if c.is_empty() || c == "KES" || c == "KSH" || c == "KSHS" => Ok("KES".to_string()),
        Some(c) => Err(AppError::ValidationError(
            format!("Currency '{}' is not supported, only KES", c)
        )),
    }
}

/// Validasi string tidak kosong dan dalam batas panjang
pub fn validate_string_length(
    value: &str,
    field_name: &str,
    min_len: usize,
    max_len: usize,
) -> AppResult<()> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} cannot be empty", field_name)));
    }

    if trimmed.chars().count() < min_len {
        return Err(AppError::BadRequest(
            format!("{} must be at least {} characters", field_name, min_len)
        ));
    }

    if trimmed.chars().count() > max_len {
        return Err(AppError::BadRequest(
            format!("{} must be at most {} characters", field_name, max_len)
        ));
    }

    Ok(())
}

/// Validasi CheckoutRequestID dari Daraja
pub fn validate_checkout_request_id(id: &str) -> AppResult<()> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest("Checkout request ID cannot be empty".to_string()));
    }

    if id.len() > 100 {
        return Err(AppError::BadRequest("Checkout request ID is too long".to_string()));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::BadRequest("Checkout request ID has invalid characters".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_formats() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("+254 712 345 678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("254-712-345-678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0110123456").unwrap(), "254110123456");
    }

    #[test]
    fn test_normalize_phone_rejects_invalid() {
        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("07123").is_err());
        assert!(normalize_phone("0812345678").is_err());
        assert!(normalize_phone("+1 555 123 4567").is_err());
        assert!(normalize_phone("07l2345678").is_err());
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency(None).unwrap(), "KES");
        assert_eq!(normalize_currency(Some("KSH")).unwrap(), "KES");
        assert_eq!(normalize_currency(Some("kes")).unwrap(), "KES");
        assert!(normalize_currency(Some("USD")).is_err());
    }

    #[test]
    fn test_validate_string_length() {
        assert!(validate_string_length("Wanjiru", "name", 1, 100).is_ok());
        assert!(validate_string_length("   ", "name", 1, 100).is_err());
        assert!(validate_string_length(&"a".repeat(101), "name", 1, 100).is_err());
    }

    #[test]
    fn test_validate_checkout_request_id() {
        assert!(validate_checkout_request_id("ws_CO_191220191020363925").is_ok());
        assert!(validate_checkout_request_id("").is_err());
        assert!(validate_checkout_request_id("ws_CO_1; DROP TABLE").is_err());
    }
}
