// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the TidyHQ booking engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidyhq_core::RetryPolicy;

/// Top-level TidyHQ configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TidyConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub app: AppConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification dispatcher loop settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Retry budget and backoff for failed deliveries.
    #[serde(default)]
    pub retry: RetryConfig,

    /// SMTP email delivery.
    #[serde(default)]
    pub email: EmailConfig,

    /// SMS gateway delivery.
    #[serde(default)]
    pub sms: SmsConfig,

    /// Wording and defaults of outgoing notifications.
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Instance name shown in logs.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_app_name() -> String {
    "tidyhq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tidyhq").join("tidyhq.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tidyhq.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Notification dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Seconds between dispatch cycles of one worker.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum jobs claimed per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of concurrent worker loops.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum concurrent deliveries within one cycle.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Upper bound on a single handler call.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,

    /// Claim lease. A `processing` job older than this is swept back to `pending`.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            workers: default_workers(),
            max_in_flight: default_max_in_flight(),
            handler_timeout_secs: default_handler_timeout_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl DispatcherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    25
}

fn default_workers() -> usize {
    1
}

fn default_max_in_flight() -> usize {
    5
}

fn default_handler_timeout_secs() -> u64 {
    30
}

fn default_stale_after_secs() -> u64 {
    300
}

/// Retry budget configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries granted after the first failed delivery.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base in seconds; doubled per attempt.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Backoff ceiling in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.base_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

fn default_max_attempts() -> u32 {
    tidyhq_core::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_secs() -> u64 {
    tidyhq_core::retry::DEFAULT_BASE_DELAY.as_secs()
}

fn default_max_delay_secs() -> u64 {
    tidyhq_core::retry::DEFAULT_MAX_DELAY.as_secs()
}

/// SMTP email configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Register the email handler with the dispatcher.
    #[serde(default)]
    pub enabled: bool,

    /// SMTP relay host.
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Transport security: `starttls`, `tls`, or `none`.
    #[serde(default = "default_smtp_security")]
    pub security: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender mailbox, e.g. `Sparkle Cleaning <bookings@example.com>`.
    #[serde(default)]
    pub from_address: Option<String>,

    #[serde(default)]
    pub reply_to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            security: default_smtp_security(),
            username: None,
            password: None,
            from_address: None,
            reply_to: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_security() -> String {
    "starttls".to_string()
}

/// SMS gateway configuration (Twilio-compatible REST API).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    /// Register the SMS handler with the dispatcher.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number in E.164 format.
    #[serde(default)]
    pub from_number: Option<String>,

    /// Gateway base URL.
    #[serde(default = "default_sms_api_base")]
    pub api_base_url: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_sms_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base_url: default_sms_api_base(),
            request_timeout_secs: default_sms_timeout_secs(),
        }
    }
}

fn default_sms_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_sms_timeout_secs() -> u64 {
    15
}

/// Outgoing notification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Business name used in message bodies and subjects.
    #[serde(default = "default_business_name")]
    pub business_name: String,

    /// Contact phone appended to customer messages.
    #[serde(default)]
    pub contact_phone: Option<String>,

    /// Announce the team to the customer when staff is assigned, unless the caller says otherwise.
    #[serde(default)]
    pub notify_customer_on_assign: bool,

    /// Send the cancellation notice by SMS when the customer has a phone.
    #[serde(default = "default_true")]
    pub cancellation_sms: bool,

    /// Send the cancellation notice by email when the customer has an address.
    #[serde(default = "default_true")]
    pub cancellation_email: bool,

    /// Send a thank-you email when a booking completes.
    #[serde(default = "default_true")]
    pub completion_email: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            business_name: default_business_name(),
            contact_phone: None,
            notify_customer_on_assign: false,
            cancellation_sms: true,
            cancellation_email: true,
            completion_email: true,
        }
    }
}

fn default_business_name() -> String {
    "TidyHQ Cleaning".to_string()
}

fn default_true() -> bool {
    true
}
