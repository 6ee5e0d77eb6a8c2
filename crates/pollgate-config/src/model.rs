// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Pollgate.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Pollgate configuration.
///
/// Loaded once at startup from TOML files and environment variables, then
/// passed by value to every component constructor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollgateConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Telegram bot integration settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Record store backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Delivery loop and cache tuning.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl PollgateConfig {
    /// Returns a copy with secrets replaced by a placeholder, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.telegram.bot_token.is_some() {
            copy.telegram.bot_token = Some("[redacted]".to_string());
        }
        if copy.gateway.api_key.is_some() {
            copy.gateway.api_key = Some("[redacted]".to_string());
        }
        copy
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. Required by `pollgate serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Telegram user IDs or usernames allowed to subscribe their chat.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

/// Which record store implementation to open at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Embedded SQLite database file.
    #[default]
    Sqlite,
    /// In-process maps; nothing survives a restart.
    Memory,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend selected once at startup.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Retention of a record after its last write, in seconds.
    #[serde(default = "default_record_ttl_secs")]
    pub record_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            record_ttl_secs: default_record_ttl_secs(),
        }
    }
}

fn default_database_path() -> String {
    "pollgate.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_record_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Key expected in `X-Api-Key`. Without it every request is rejected.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            api_key: None,
        }
    }
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

/// Delivery loop and local cache tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Period of the send loop, in milliseconds.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    /// Lifetime of a local cache entry from insertion, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of records held in the local cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Period of the expired-record sweep, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: default_send_interval_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_send_interval_ms() -> u64 {
    500
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PollgateConfig::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.record_ttl_secs, 604_800);
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.delivery.send_interval_ms, 500);
        assert_eq!(config.delivery.cache_ttl_secs, 600);
    }

    #[test]
    fn backend_parses_lowercase() {
        let config: PollgateConfig = toml::from_str("[storage]\nbackend = \"memory\"\n").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn redacted_hides_secrets() {
        let mut config = PollgateConfig::default();
        config.telegram.bot_token = Some("123:SECRET".into());
        config.gateway.api_key = Some("hunter2".into());
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("SECRET"));
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("[redacted]"));
    }
}
