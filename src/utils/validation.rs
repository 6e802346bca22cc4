//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::*;

/// Validate that an amount is not negative
pub fn validate_non_negative_amount(amount: &BigDecimal, label: &str) -> PaymentResult<()> {
    if *amount < BigDecimal::from(0) {
        Err(PaymentError::Validation(format!(
            "{} cannot be negative: {}",
            label, amount
        )))
    } else {
        Ok(())
    }
}

/// Validate the reason given for voiding a receipt
pub fn validate_void_reason(reason: &str, max_length: usize) -> PaymentResult<()> {
    if reason.trim().is_empty() {
        return Err(PaymentError::Validation(
            "A reason is required to void a receipt".to_string(),
        ));
    }

    if reason.chars().count() > max_length {
        return Err(PaymentError::Validation(format!(
            "Void reason cannot exceed {} characters",
            max_length
        )));
    }

    Ok(())
}

/// Validate the user recorded against a status change
pub fn validate_actor(actor: &str) -> PaymentResult<()> {
    if actor.trim().is_empty() {
        return Err(PaymentError::Validation(
            "The user performing the void must be recorded".to_string(),
        ));
    }

    Ok(())
}
