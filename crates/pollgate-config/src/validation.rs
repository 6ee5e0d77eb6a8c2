// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde attributes cannot express: bind hosts, non-empty
//! database paths, and lower bounds on intervals and cache sizing.

use crate::diagnostic::ConfigError;
use crate::model::{PollgateConfig, StorageBackend};

/// Smallest accepted send loop period. Anything tighter floods the Bot API.
pub const MIN_SEND_INTERVAL_MS: u64 = 50;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &PollgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        errors.push(invalid(
            "storage.database_path must not be empty when backend = \"sqlite\"",
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(invalid("gateway.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(invalid(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.delivery.send_interval_ms < MIN_SEND_INTERVAL_MS {
        errors.push(invalid(format!(
            "delivery.send_interval_ms must be at least {MIN_SEND_INTERVAL_MS}, got {}",
            config.delivery.send_interval_ms
        )));
    }

    for (key, value) in [
        ("storage.record_ttl_secs", config.storage.record_ttl_secs),
        ("delivery.cache_ttl_secs", config.delivery.cache_ttl_secs),
        ("delivery.cache_capacity", config.delivery.cache_capacity),
        ("delivery.sweep_interval_secs", config.delivery.sweep_interval_secs),
    ] {
        if value == 0 {
            errors.push(invalid(format!("{key} must be greater than 0")));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks required only by `pollgate serve`.
pub fn validate_for_serve(config: &PollgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = match validate_config(config) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    let has_token = config
        .telegram
        .bot_token
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    if !has_token {
        errors.push(invalid(
            "telegram.bot_token is required to serve (or set POLLGATE_TELEGRAM_BOT_TOKEN)",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
