// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands.
//!
//! Each command runs a single engine operation and prints its
//! [`OperationResult`] as JSON. The exit code is non-zero when the
//! operation (or any item of a bulk operation) failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use tidyhq_booking::{AssignOptions, Engine};
use tidyhq_config::TidyConfig;
use tidyhq_core::{
    BookingId, BookingStatus, Channel, JobFilter, JobStatus, NewJob, NotificationPayload,
    OperationResult, SystemClock, TidyError,
};
use tidyhq_dispatch::HandlerRegistry;
use tidyhq_storage::SqliteStore;
use tracing::warn;

#[cfg(feature = "email")]
use tidyhq_email::EmailHandler;

#[cfg(feature = "sms")]
use tidyhq_sms::SmsHandler;

/// Opens the SQLite store and wires the engine with the enabled handlers.
pub async fn build_engine(config: &TidyConfig) -> Result<Engine<SqliteStore>, TidyError> {
    let store = SqliteStore::open(config.storage.clone()).await?;
    let registry = build_registry(config)?;
    Ok(Engine::new(
        Arc::new(store),
        registry,
        Arc::new(SystemClock),
        config,
    ))
}

/// Registers a handler for every channel enabled in the configuration.
pub fn build_registry(config: &TidyConfig) -> Result<HandlerRegistry, TidyError> {
    let mut registry = HandlerRegistry::new();

    #[cfg(feature = "email")]
    {
        if config.email.enabled {
            registry.register(Arc::new(EmailHandler::from_config(&config.email)?));
        }
    }
    #[cfg(not(feature = "email"))]
    {
        if config.email.enabled {
            warn!("email is enabled but this build has no `email` feature");
        }
    }

    #[cfg(feature = "sms")]
    {
        if config.sms.enabled {
            registry.register(Arc::new(SmsHandler::from_config(&config.sms)?));
        }
    }
    #[cfg(not(feature = "sms"))]
    {
        if config.sms.enabled {
            warn!("sms is enabled but this build has no `sms` feature");
        }
    }

    if registry.is_empty() {
        warn!("no notification handlers enabled; dispatched jobs will fail as unroutable");
    }
    Ok(registry)
}

/// Prints a result as pretty JSON and maps its success flag to an exit code.
pub fn emit<T: Serialize>(result: &OperationResult<T>) -> ExitCode {
    if !print_json(result) {
        return ExitCode::FAILURE;
    }
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            true
        }
        Err(e) => {
            eprintln!("error: failed to serialize result: {e}");
            false
        }
    }
}

pub async fn transition(
    engine: &Engine<SqliteStore>,
    booking_ids: &[String],
    to: BookingStatus,
    actor: &str,
    reason: Option<&str>,
) -> ExitCode {
    if let [booking_id] = booking_ids {
        return emit(&engine.transition(booking_id, to, actor, reason).await);
    }
    let result = engine.transition_many(booking_ids, to, actor, reason).await;
    let all_ok = result
        .data
        .as_ref()
        .is_some_and(|items| items.iter().all(|item| item.result.success));
    if !print_json(&result) || !all_ok {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// `--notify-customer` forces the team announcement, `--no-notify-customer`
/// suppresses it, neither defers to configuration.
pub fn assign_options(notify: bool, no_notify: bool) -> AssignOptions {
    let notify_customer = match (notify, no_notify) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };
    AssignOptions { notify_customer }
}

pub fn ad_hoc_job(
    engine: &Engine<SqliteStore>,
    channel: Channel,
    to: String,
    message: String,
    subject: Option<String>,
    booking: Option<String>,
    attachment: Option<PathBuf>,
) -> NewJob {
    let mut payload = match subject {
        Some(subject) => NotificationPayload::email(to, subject, message),
        None => NotificationPayload::text(to, message),
    };
    if let Some(path) = attachment {
        payload = payload.with_attachment(path);
    }
    let job = engine.new_job(channel, payload);
    match booking {
        Some(id) => job.for_booking(BookingId(id)),
        None => job,
    }
}

pub fn job_filter(
    status: Option<JobStatus>,
    channel: Option<Channel>,
    booking: Option<String>,
    limit: Option<usize>,
) -> JobFilter {
    JobFilter {
        status,
        channel,
        booking_id: booking.map(BookingId),
        limit,
    }
}

const REDACTED: &str = "********";

/// Prints the effective configuration as TOML.
pub fn print_config(config: &TidyConfig) -> ExitCode {
    let mut shown = config.clone();
    if shown.email.password.is_some() {
        shown.email.password = Some(REDACTED.into());
    }
    if shown.sms.auth_token.is_some() {
        shown.sms.auth_token = Some(REDACTED.into());
    }
    match toml::to_string_pretty(&shown) {
        Ok(rendered) => {
            print!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to render configuration: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_flags_map_to_override() {
        assert_eq!(assign_options(true, false).notify_customer, Some(true));
        assert_eq!(assign_options(false, true).notify_customer, Some(false));
        assert_eq!(assign_options(false, false).notify_customer, None);
    }

    #[test]
    fn job_filter_carries_booking() {
        let filter = job_filter(Some(JobStatus::Failed), None, Some("B1".into()), Some(10));
        assert_eq!(filter.booking_id, Some(BookingId("B1".into())));
        assert_eq!(filter.status, Some(JobStatus::Failed));
        assert_eq!(filter.limit, Some(10));
    }

    #[test]
    fn registry_is_empty_when_nothing_is_enabled() {
        let registry = build_registry(&TidyConfig::default()).unwrap();
        assert!(registry.is_empty());
    }

    #[cfg(feature = "email")]
    #[tokio::test]
    async fn enabled_email_without_sender_is_a_config_error() {
        let mut config = TidyConfig::default();
        config.email.enabled = true;
        config.email.smtp_host = Some("smtp.example.com".into());
        config.email.from_address = None;
        match build_registry(&config) {
            Err(TidyError::Config(_)) => {}
            other => panic!("expected config error, got {:?}", other.map(|r| r.channels())),
        }
    }
}
