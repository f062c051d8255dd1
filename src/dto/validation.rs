//! Validation helpers for DTOs.

use validator::ValidationError;

/// Teammates that can be named alongside the registrant (squad of four).
pub const MAX_ROSTER_MATES: usize = 3;

/// Validates that a UTR (bank transaction reference) is exactly 12 digits.
///
/// # Examples
///
/// ```ignore
/// validate_utr("123456789012") // Ok
/// validate_utr("12345678901")  // Err - too short
/// validate_utr("12345678901a") // Err - non-digit
/// ```
pub fn validate_utr(utr: &str) -> Result<(), ValidationError> {
    if utr.len() != 12 {
        let mut err = ValidationError::new("utr_length");
        err.message =
            Some(format!("UTR number must be exactly 12 digits (got {})", utr.len()).into());
        return Err(err);
    }

    if !utr.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("utr_format");
        err.message = Some("UTR number must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a UPI id of the `name@bank` shape.
pub fn validate_upi(upi: &str) -> Result<(), ValidationError> {
    if upi.len() < 3 || upi.len() > 50 {
        let mut err = ValidationError::new("upi_length");
        err.message = Some("UPI ID must be between 3 and 50 characters".into());
        return Err(err);
    }

    let mut parts = upi.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let bank = parts.next().unwrap_or_default();

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    let bank_ok = !bank.is_empty() && bank.chars().all(|c| c.is_ascii_alphanumeric());

    if !local_ok || !bank_ok {
        let mut err = ValidationError::new("upi_format");
        err.message = Some("UPI ID must look like name@bank".into());
        return Err(err);
    }

    Ok(())
}

/// Validates roster size and member names for a registration.
pub fn validate_roster(roster: &Vec<String>) -> Result<(), ValidationError> {
    if roster.len() > MAX_ROSTER_MATES {
        let mut err = ValidationError::new("roster_size");
        err.message =
            Some(format!("Team roster can name at most {MAX_ROSTER_MATES} teammates").into());
        return Err(err);
    }

    if roster
        .iter()
        .any(|name| name.trim().is_empty() || name.len() > 50)
    {
        let mut err = ValidationError::new("roster_member");
        err.message = Some("Every roster name must be 1 to 50 characters".into());
        return Err(err);
    }

    Ok(())
}
