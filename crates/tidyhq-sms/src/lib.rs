// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS notification handler for the TidyHQ booking engine.
//!
//! Sends `sms` jobs through a Twilio-compatible Messages API: a form-encoded
//! POST authenticated with the account SID and auth token. Recipients are
//! checked for E.164 format before any request is made.

pub mod client;
pub mod error;
pub mod handler;
pub mod phone;

pub use client::SmsClient;
pub use error::SmsError;
pub use handler::SmsHandler;
