// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email notification handler for the TidyHQ booking engine.
//!
//! Delivers `email` jobs over SMTP via `lettre`. The payload's text body is
//! always sent; an HTML body turns the message into `multipart/alternative`,
//! and an attachment path wraps everything in `multipart/mixed`. Attachment
//! files are transient and removed once the job reaches a terminal status.

pub mod error;
pub mod handler;
pub mod message;
pub mod transport;

pub use error::EmailError;
pub use handler::EmailHandler;
pub use transport::{MailTransport, SmtpMailer};
