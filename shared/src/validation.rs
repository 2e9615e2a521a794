//! Validation helpers for ledger and settlement inputs
//!
//! Services run these before opening a transaction so no invalid input ever
//! reaches a write.

use rust_decimal::Decimal;

/// Validate a crate count that must be strictly positive
pub fn validate_positive_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a crate count that may be zero (departed/returned tour counts)
pub fn validate_non_negative_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Validate a monetary amount that must be strictly positive
pub fn validate_positive_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be positive");
    }
    Ok(())
}

/// Validate the mandatory reason on a manual stock adjustment
pub fn validate_required_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("A reason is required");
    }
    Ok(())
}

/// Maximum accepted length for free-text notes
pub const MAX_NOTE_LEN: usize = 500;

/// Validate an optional free-text note
pub fn validate_note(note: Option<&str>) -> Result<(), &'static str> {
    match note {
        Some(n) if n.len() > MAX_NOTE_LEN => Err("Note is too long"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(1).is_ok());
        assert!(validate_positive_quantity(0).is_err());
        assert!(validate_positive_quantity(-3).is_err());
    }

    #[test]
    fn test_non_negative_quantity() {
        assert!(validate_non_negative_quantity(0).is_ok());
        assert!(validate_non_negative_quantity(10).is_ok());
        assert!(validate_non_negative_quantity(-1).is_err());
    }

    #[test]
    fn test_positive_amount() {
        assert!(validate_positive_amount(Decimal::new(1, 2)).is_ok());
        assert!(validate_positive_amount(Decimal::ZERO).is_err());
        assert!(validate_positive_amount(Decimal::new(-100, 2)).is_err());
    }

    #[test]
    fn test_required_reason() {
        assert!(validate_required_reason("inventory count correction").is_ok());
        assert!(validate_required_reason("").is_err());
        assert!(validate_required_reason("   ").is_err());
    }

    #[test]
    fn test_note_length() {
        assert!(validate_note(None).is_ok());
        assert!(validate_note(Some("broken pallet")).is_ok());
        assert!(validate_note(Some(&"x".repeat(MAX_NOTE_LEN + 1))).is_err());
    }
}
