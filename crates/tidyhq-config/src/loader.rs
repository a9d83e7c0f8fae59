// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tidyhq.toml` > `~/.config/tidyhq/tidyhq.toml` > `/etc/tidyhq/tidyhq.toml`
//! with environment variable overrides via `TIDYHQ_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TidyConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tidyhq/tidyhq.toml";

/// Configuration file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "tidyhq.toml";

/// Sections addressable through `TIDYHQ_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "app",
    "storage",
    "dispatcher",
    "retry",
    "email",
    "sms",
    "notifications",
];

/// The user's XDG config file, if a config directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tidyhq").join("tidyhq.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tidyhq/tidyhq.toml` (system-wide)
/// 3. `~/.config/tidyhq/tidyhq.toml` (user XDG config)
/// 4. `./tidyhq.toml` (local directory)
/// 5. `TIDYHQ_*` environment variables
pub fn load_config() -> Result<TidyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TidyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TidyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TidyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TidyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TidyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so key names keep their
/// underscores: `TIDYHQ_DISPATCHER_BATCH_SIZE` maps to `dispatcher.batch_size`,
/// not `dispatcher.batch.size`.
fn env_provider() -> Env {
    Env::prefixed("TIDYHQ_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name onto its dotted config path.
fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_first_section_only() {
        assert_eq!(map_env_key("dispatcher_batch_size"), "dispatcher.batch_size");
        assert_eq!(map_env_key("sms_auth_token"), "sms.auth_token");
        assert_eq!(
            map_env_key("notifications_business_name"),
            "notifications.business_name"
        );
        assert_eq!(map_env_key("retry_max_delay_secs"), "retry.max_delay_secs");
    }

    #[test]
    fn unknown_prefixes_pass_through() {
        assert_eq!(map_env_key("bogus_key"), "bogus_key");
        // `storage` must not match a bare `storagex_...` key.
        assert_eq!(map_env_key("storagex_path"), "storagex_path");
    }
}
