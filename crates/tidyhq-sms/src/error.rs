// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS delivery errors and their retry classification.

use thiserror::Error;
use tidyhq_core::TidyError;

/// Error type for SMS delivery failures.
#[derive(Debug, Error)]
pub enum SmsError {
    /// The recipient is not an E.164 phone number.
    #[error("invalid phone number `{0}`: expected E.164 format such as +15550100100")]
    InvalidNumber(String),

    /// The request never produced a response (DNS, connect, timeout).
    #[error("SMS gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("SMS gateway returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The gateway accepted the request but the response was unreadable.
    #[error("unexpected SMS gateway response: {0}")]
    Decode(String),

    /// The handler could not be configured.
    #[error("SMS configuration error: {0}")]
    Config(String),
}

impl SmsError {
    /// Returns true when resending the same message can never succeed.
    ///
    /// 4xx answers are permanent except 408 and 429, which ask the caller to
    /// come back later, and 401 and 403. Those point at our own credentials or
    /// account standing, so the message stays queued until an operator fixes them.
    pub fn is_permanent(&self) -> bool {
        match self {
            SmsError::InvalidNumber(_) => true,
            SmsError::Api { status, .. } => is_permanent_status(*status),
            SmsError::Request(e) => e.is_builder(),
            SmsError::Decode(_) | SmsError::Config(_) => false,
        }
    }
}

fn is_permanent_status(status: u16) -> bool {
    (400..500).contains(&status) && !matches!(status, 401 | 403 | 408 | 429)
}

impl From<SmsError> for TidyError {
    fn from(e: SmsError) -> Self {
        match e {
            SmsError::Config(message) => TidyError::Config(message),
            e if e.is_permanent() => TidyError::permanent(e.to_string()),
            e => TidyError::ProviderDelivery {
                message: e.to_string(),
                source: Some(Box::new(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> SmsError {
        SmsError::Api {
            status,
            message: "gateway said no".into(),
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(api(400).is_permanent());
        assert!(api(404).is_permanent());
        assert!(api(422).is_permanent());
    }

    #[test]
    fn credential_errors_are_transient() {
        assert!(!api(401).is_permanent());
        assert!(!api(403).is_permanent());
        assert!(matches!(
            TidyError::from(api(401)),
            TidyError::ProviderDelivery { .. }
        ));
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        assert!(!api(408).is_permanent());
        assert!(!api(429).is_permanent());
        assert!(!api(500).is_permanent());
        assert!(!api(503).is_permanent());
    }

    #[test]
    fn conversion_preserves_classification() {
        assert!(TidyError::from(api(400)).is_permanent_delivery_failure());
        assert!(matches!(
            TidyError::from(api(503)),
            TidyError::ProviderDelivery { .. }
        ));
        assert!(TidyError::from(SmsError::InvalidNumber("555".into())).is_permanent_delivery_failure());
    }

    #[test]
    fn display_is_actionable() {
        let err = SmsError::InvalidNumber("555-0100".into());
        assert!(err.to_string().contains("E.164"));
        assert_eq!(api(503).to_string(), "SMS gateway returned HTTP 503: gateway said no");
    }
}
