// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the TidyHQ configuration system.

use std::time::Duration;

use tidyhq_config::diagnostic::ConfigError;
use tidyhq_config::model::TidyConfig;
use tidyhq_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tidy_config() {
    let toml = r#"
[app]
name = "sparkle"
log_level = "debug"

[storage]
database_path = "/tmp/tidyhq-test.db"
wal_mode = false

[dispatcher]
interval_secs = 10
batch_size = 50
workers = 2
handler_timeout_secs = 20
stale_after_secs = 120

[retry]
max_attempts = 3
base_delay_secs = 30
max_delay_secs = 900

[email]
enabled = true
smtp_host = "smtp.example.com"
smtp_port = 465
security = "tls"
from_address = "Sparkle <bookings@example.com>"

[sms]
enabled = true
account_sid = "AC123"
auth_token = "secret"
from_number = "+15550001111"

[notifications]
business_name = "Sparkle Cleaning"
contact_phone = "+15550009999"
notify_customer_on_assign = true
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.name, "sparkle");
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/tidyhq-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.dispatcher.interval(), Duration::from_secs(10));
    assert_eq!(config.dispatcher.batch_size, 50);
    assert_eq!(config.dispatcher.workers, 2);
    assert_eq!(config.dispatcher.stale_after(), Duration::from_secs(120));
    let policy = config.retry.policy();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.base_delay, Duration::from_secs(30));
    assert_eq!(policy.max_delay, Duration::from_secs(900));
    assert_eq!(config.email.smtp_port, 465);
    assert_eq!(config.email.security, "tls");
    assert_eq!(config.sms.from_number.as_deref(), Some("+15550001111"));
    assert_eq!(config.notifications.business_name, "Sparkle Cleaning");
    assert!(config.notifications.notify_customer_on_assign);
}

/// Missing sections fall back to documented defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML is valid");
    assert_eq!(config.app.log_level, "info");
    assert_eq!(config.dispatcher.interval_secs, 30);
    assert_eq!(config.dispatcher.batch_size, 25);
    assert_eq!(config.dispatcher.workers, 1);
    assert_eq!(config.dispatcher.handler_timeout_secs, 30);
    assert_eq!(config.dispatcher.stale_after_secs, 300);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_secs, 60);
    assert_eq!(config.retry.max_delay_secs, 3600);
    assert!(!config.email.enabled);
    assert!(!config.sms.enabled);
    assert_eq!(config.sms.api_base_url, "https://api.twilio.com");
    assert!(config.notifications.cancellation_sms);
}

#[test]
fn unknown_field_in_dispatcher_produces_error() {
    let toml = r#"
[dispatcher]
batch_sise = 10
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("batch_sise"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[billing]
currency = "USD"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn diagnostic_suggests_close_key() {
    let toml = r#"
[retry]
max_atempts = 3
"#;
    let errors = load_and_validate_str(toml).expect_err("typo must fail");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion: Some(s), valid_keys, .. }
                if key == "max_atempts" && s == "max_attempts" && valid_keys.contains("max_delay_secs")
        )
    });
    assert!(found, "expected suggestion, got {errors:?}");
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[dispatcher]
workers = "many"
"#;
    let errors = load_and_validate_str(toml).expect_err("wrong type must fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { key, .. } if key.contains("workers")
    )));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let errors = load_and_validate_str("[sms]\nauth_tokn = \"x\"\n").unwrap_err();
    let error = &errors[0];
    assert_eq!(
        error.code().map(|c| c.to_string()).as_deref(),
        Some("tidyhq::config::unknown_key")
    );
    let mut out = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut out, error as &dyn Diagnostic)
        .unwrap();
    assert!(out.contains("auth_token"), "render: {out}");
}

#[test]
fn validation_errors_surface_from_str() {
    let toml = r#"
[email]
enabled = true
"#;
    let errors = load_and_validate_str(toml).expect_err("incomplete email config");
    assert!(errors.len() >= 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn load_and_validate_defaults() {
    let config = load_and_validate_str("").expect("defaults validate");
    assert_eq!(config.app.name, "tidyhq");
}

#[test]
fn file_and_env_layers_merge() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[dispatcher]
batch_size = 10
workers = 3

[notifications]
business_name = "From File"
"#,
        )?;
        jail.set_env("TIDYHQ_DISPATCHER_BATCH_SIZE", "40");
        jail.set_env("TIDYHQ_NOTIFICATIONS_BUSINESS_NAME", "From Env");
        jail.set_env("TIDYHQ_RETRY_MAX_ATTEMPTS", "7");

        let config: TidyConfig = load_config_from_path(std::path::Path::new("custom.toml"))?;
        assert_eq!(config.dispatcher.batch_size, 40);
        assert_eq!(config.dispatcher.workers, 3);
        assert_eq!(config.notifications.business_name, "From Env");
        assert_eq!(config.retry.max_attempts, 7);
        Ok(())
    });
}

// Tests that read `TIDYHQ_*` env vars run inside a `Jail`, which serializes
// them against `file_and_env_layers_merge`.
#[test]
fn missing_config_file_is_silently_skipped() {
    figment::Jail::expect_with(|jail| {
        let config = load_and_validate_path(&jail.directory().join("absent.toml"))
            .map_err(|e| format!("{e:?}"))?;
        assert_eq!(config.dispatcher.batch_size, 25);
        Ok(())
    });
}

#[test]
fn file_diagnostic_points_at_offending_key() {
    figment::Jail::expect_with(|jail| {
        let content = "[app]\nname = \"x\"\n\n[sms]\nfrom_numbr = \"+1\"\n";
        jail.create_file("tidyhq.toml", content)?;
        let path = jail.directory().join("tidyhq.toml");

        let errors = load_and_validate_path(&path).expect_err("typo must fail");
        let span = errors
            .iter()
            .find_map(|e| match e {
                ConfigError::UnknownKey { span, .. } => *span,
                _ => None,
            })
            .expect("span resolved from file source");
        assert_eq!(
            &content[span.offset()..span.offset() + span.len()],
            "from_numbr"
        );
        Ok(())
    });
}
