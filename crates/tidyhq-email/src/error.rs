// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email delivery errors and their retry classification.

use std::path::PathBuf;

use thiserror::Error;
use tidyhq_core::TidyError;

/// Error type for email delivery failures.
#[derive(Debug, Error)]
pub enum EmailError {
    /// The recipient, sender, or reply-to address could not be parsed.
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("email build error: {0}")]
    Build(String),

    /// The attachment named by the payload could not be read.
    #[error("attachment {} unreadable: {source}", path.display())]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The relay refused the message with a permanent (5xx) reply.
    #[error("SMTP relay rejected the message: {0}")]
    Rejected(String),

    /// Connection, TLS, timeout, or transient (4xx) relay failure.
    #[error("SMTP relay unavailable: {0}")]
    Unavailable(String),

    /// The SMTP transport could not be configured.
    #[error("SMTP configuration error: {0}")]
    Config(String),
}

impl EmailError {
    /// Returns true when resending the same message can never succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            EmailError::Address(_)
            | EmailError::Build(_)
            | EmailError::Attachment { .. }
            | EmailError::Rejected(_) => true,
            EmailError::Unavailable(_) | EmailError::Config(_) => false,
        }
    }
}

impl From<lettre::transport::smtp::Error> for EmailError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        if e.is_permanent() {
            EmailError::Rejected(e.to_string())
        } else {
            EmailError::Unavailable(e.to_string())
        }
    }
}

impl From<EmailError> for TidyError {
    fn from(e: EmailError) -> Self {
        match e {
            EmailError::Config(message) => TidyError::Config(message),
            e if e.is_permanent() => TidyError::permanent(e.to_string()),
            e => TidyError::ProviderDelivery {
                message: e.to_string(),
                source: Some(Box::new(e)),
            },
        }
    }
}
