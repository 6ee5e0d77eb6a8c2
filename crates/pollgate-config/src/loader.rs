// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pollgate.toml` > `~/.config/pollgate/pollgate.toml` > `/etc/pollgate/pollgate.toml`
//! with environment variable overrides via `POLLGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PollgateConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pollgate/pollgate.toml` (system-wide)
/// 3. `~/.config/pollgate/pollgate.toml` (user XDG config)
/// 4. `./pollgate.toml` (local directory)
/// 5. `POLLGATE_*` environment variables
pub fn load_config() -> Result<PollgateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<PollgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PollgateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PollgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PollgateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PollgateConfig::default()))
        .merge(Toml::file("/etc/pollgate/pollgate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("pollgate/pollgate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("pollgate.toml"))
        .merge(env_provider())
}

/// Top-level config sections reachable from the environment.
const ENV_SECTIONS: [&str; 5] = ["service", "telegram", "storage", "gateway", "delivery"];

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `POLLGATE_TELEGRAM_BOT_TOKEN` must map to `telegram.bot_token`.
/// Figment hands the key over with its original case, so it is lowercased
/// before the section prefix is matched.
fn env_provider() -> Env {
    Env::prefixed("POLLGATE_").map(|key| env_key_to_path(key.as_str()).into())
}

/// `TELEGRAM_BOT_TOKEN` -> `telegram.bot_token`. Keys outside a known section
/// are only lowercased and fail extraction as unknown fields.
fn env_key_to_path(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(field) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{field}");
        }
    }
    key
}
