// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero intervals, ordered backoff bounds, and complete provider
//! credentials for enabled channels.

use tidyhq_core::retry::MAX_BACKOFF;

use crate::diagnostic::ConfigError;
use crate::model::TidyConfig;

/// Largest accepted backoff ceiling.
const MAX_DELAY_CEILING_SECS: u64 = MAX_BACKOFF.as_secs();

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const SMTP_SECURITY_MODES: &[&str] = &["starttls", "tls", "none"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TidyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.app.log_level.as_str()) {
        fail(format!(
            "app.log_level `{}` must be one of {}",
            config.app.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let dispatcher = &config.dispatcher;
    for (key, value) in [
        ("interval_secs", dispatcher.interval_secs),
        ("handler_timeout_secs", dispatcher.handler_timeout_secs),
        ("stale_after_secs", dispatcher.stale_after_secs),
    ] {
        if value == 0 {
            fail(format!("dispatcher.{key} must be at least 1"));
        }
    }
    for (key, value) in [
        ("batch_size", dispatcher.batch_size),
        ("workers", dispatcher.workers),
        ("max_in_flight", dispatcher.max_in_flight),
    ] {
        if value == 0 {
            fail(format!("dispatcher.{key} must be at least 1"));
        }
    }
    // A claimed batch drains in waves of `max_in_flight`, each bounded by the
    // handler timeout. The lease has to outlast the slowest full batch.
    if dispatcher.batch_size > 0 && dispatcher.max_in_flight > 0 {
        let waves = dispatcher.batch_size.div_ceil(dispatcher.max_in_flight) as u64;
        let worst_batch_secs = waves.saturating_mul(dispatcher.handler_timeout_secs);
        if dispatcher.stale_after_secs <= worst_batch_secs {
            fail(format!(
                "dispatcher.stale_after_secs ({}) must exceed {worst_batch_secs}s, the time a full \
                 batch of {} jobs at {} in flight may take with a {}s handler timeout",
                dispatcher.stale_after_secs,
                dispatcher.batch_size,
                dispatcher.max_in_flight,
                dispatcher.handler_timeout_secs
            ));
        }
    }

    let retry = &config.retry;
    if retry.base_delay_secs == 0 {
        fail("retry.base_delay_secs must be at least 1".to_string());
    }
    if retry.max_delay_secs < retry.base_delay_secs {
        fail(format!(
            "retry.max_delay_secs ({}) must not be below retry.base_delay_secs ({})",
            retry.max_delay_secs, retry.base_delay_secs
        ));
    }
    if retry.max_delay_secs > MAX_DELAY_CEILING_SECS {
        fail(format!(
            "retry.max_delay_secs must be at most {MAX_DELAY_CEILING_SECS}, got {}",
            retry.max_delay_secs
        ));
    }

    let email = &config.email;
    if !SMTP_SECURITY_MODES.contains(&email.security.as_str()) {
        fail(format!(
            "email.security `{}` must be one of {}",
            email.security,
            SMTP_SECURITY_MODES.join(", ")
        ));
    }
    if email.enabled {
        if is_blank(email.smtp_host.as_deref()) {
            fail("email.smtp_host is required when email.enabled = true".to_string());
        }
        if is_blank(email.from_address.as_deref()) {
            fail("email.from_address is required when email.enabled = true".to_string());
        }
        if email.username.is_some() != email.password.is_some() {
            fail("email.username and email.password must be set together".to_string());
        }
    }

    let sms = &config.sms;
    if sms.request_timeout_secs == 0 {
        fail("sms.request_timeout_secs must be at least 1".to_string());
    }
    if sms.enabled {
        for (key, value) in [
            ("account_sid", &sms.account_sid),
            ("auth_token", &sms.auth_token),
            ("from_number", &sms.from_number),
        ] {
            if is_blank(value.as_deref()) {
                fail(format!("sms.{key} is required when sms.enabled = true"));
            }
        }
        if !sms.api_base_url.starts_with("http://") && !sms.api_base_url.starts_with("https://") {
            fail(format!(
                "sms.api_base_url `{}` must be an http(s) URL",
                sms.api_base_url
            ));
        }
    }

    if config.notifications.business_name.trim().is_empty() {
        fail("notifications.business_name must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
