// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! E.164 phone number check.

use crate::error::SmsError;

/// Accepts `+` followed by 8 to 15 digits, the first of which is not zero.
pub fn validate_e164(number: &str) -> Result<(), SmsError> {
    let digits = number
        .strip_prefix('+')
        .ok_or_else(|| SmsError::InvalidNumber(number.to_string()))?;
    let valid = (8..=15).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0');
    if valid {
        Ok(())
    } else {
        Err(SmsError::InvalidNumber(number.to_string()))
    }
}
