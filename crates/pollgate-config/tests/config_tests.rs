// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Pollgate configuration system.

use pollgate_config::diagnostic::{ConfigError, suggest_key};
use pollgate_config::model::{PollgateConfig, StorageBackend};
use pollgate_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_pollgate_config() {
    let toml = r#"
[service]
log_level = "debug"

[telegram]
bot_token = "123:ABC"
allowed_users = ["@alice", "42"]

[storage]
backend = "sqlite"
database_path = "/tmp/test.db"
wal_mode = false
record_ttl_secs = 3600

[gateway]
host = "127.0.0.1"
port = 9000
api_key = "k"

[delivery]
send_interval_ms = 250
cache_ttl_secs = 60
cache_capacity = 100
sweep_interval_secs = 30
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:ABC"));
    assert_eq!(config.telegram.allowed_users, vec!["@alice", "42"]);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.record_ttl_secs, 3600);
    assert_eq!(config.gateway.host, "127.0.0.1");
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.api_key.as_deref(), Some("k"));
    assert_eq!(config.delivery.send_interval_ms, 250);
    assert_eq!(config.delivery.cache_ttl_secs, 60);
    assert_eq!(config.delivery.cache_capacity, 100);
    assert_eq!(config.delivery.sweep_interval_secs, 30);
}

#[test]
fn unknown_field_in_telegram_produces_error() {
    let toml = r#"
[telegram]
bot_tken = "abc"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("bot_tken"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.log_level, "info");
    assert!(config.telegram.bot_token.is_none());
    assert!(config.telegram.allowed_users.is_empty());
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.storage.database_path, "pollgate.db");
    assert!(config.storage.wal_mode);
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 8080);
    assert!(config.gateway.api_key.is_none());
    assert_eq!(config.delivery.send_interval_ms, 500);
}

/// `telegram.bot_token` must stay one key, not `telegram.bot.token`.
#[test]
fn dotted_override_sets_bot_token() {
    use figment::{Figment, providers::Serialized};

    let config: PollgateConfig = Figment::new()
        .merge(Serialized::defaults(PollgateConfig::default()))
        .merge(("telegram.bot_token", "xyz-from-env"))
        .extract()
        .expect("should set bot_token via dot notation");

    assert_eq!(config.telegram.bot_token.as_deref(), Some("xyz-from-env"));
}

#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: PollgateConfig = Figment::new()
        .merge(Serialized::defaults(PollgateConfig::default()))
        .merge(Toml::file("/nonexistent/path/pollgate.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.gateway.port, 8080);
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[redis]
url = "redis://localhost"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("redis"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn diagnostic_prot_suggests_port() {
    let valid_keys = &["host", "port", "api_key"];
    assert_eq!(suggest_key("prot", valid_keys), Some("port".to_string()));
}

#[test]
fn diagnostic_error_includes_unknown_key_and_valid_keys() {
    let toml = r#"
[gateway]
prot = 9000
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { section, key, suggestion, valid_keys, from_env, .. } if {
            section == "gateway"
                && key == "prot"
                && !from_env
                && suggestion.as_deref() == Some("gateway.port")
                && valid_keys.contains("host")
                && valid_keys.contains("api_key")
        })
    });
    assert!(found, "expected UnknownKey for `prot`, got: {errors:?}");
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[gateway]
port = "eighty"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("port"),
        "error should mention type mismatch, got: {err_str}"
    );
}

#[test]
fn key_in_wrong_section_points_to_its_section() {
    let toml = r#"
[gateway]
bot_token = "123:ABC"
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let error = errors
        .iter()
        .find(|e| matches!(e, ConfigError::UnknownKey { .. }))
        .expect("unknown key diagnostic");
    let help = miette::Diagnostic::help(error).expect("help text").to_string();
    assert!(help.contains("[telegram]"), "got: {help}");
    assert!(help.contains("POLLGATE_TELEGRAM_BOT_TOKEN"), "got: {help}");
}

#[test]
fn unknown_section_is_reported_as_section() {
    let errors = load_and_validate_str("[telegarm]\nbot_token = \"x\"\n")
        .expect_err("should produce errors");
    assert!(
        errors.iter().any(|e| matches!(
            e,
            ConfigError::UnknownSection { section, suggestion, .. }
                if section == "telegarm" && suggestion.as_deref() == Some("telegram")
        )),
        "got: {errors:?}"
    );
}

#[test]
fn unknown_backend_lists_the_options() {
    let toml = r#"
[storage]
backend = "mongo"
"#;
    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    assert!(
        errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { key, expected, .. }
                if key == "storage.backend" && expected.contains("`sqlite`") && expected.contains("`memory`")
        )),
        "got: {errors:?}"
    );
}

#[test]
fn invalid_backend_name_is_rejected() {
    let toml = r#"
[storage]
backend = "mongo"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        section: "gateway".to_string(),
        key: "prot".to_string(),
        suggestion: Some("gateway.port".to_string()),
        valid_keys: "host, port, api_key".to_string(),
        from_env: false,
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `gateway.port`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("prot"));
}

#[test]
fn load_and_validate_reports_semantic_errors() {
    let toml = r#"
[delivery]
send_interval_ms = 5
cache_capacity = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2, "got: {errors:?}");
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn load_and_validate_valid_toml() {
    let toml = r#"
[storage]
backend = "memory"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.storage.backend, StorageBackend::Memory);
}
