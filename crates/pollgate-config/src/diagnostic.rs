// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics that know the Pollgate schema.
//!
//! Unknown keys are matched against their own section first and then against
//! every other section, so `bot_token` written under `[gateway]` is pointed
//! at `[telegram]` instead of getting a far-fetched spelling suggestion.
//! Errors raised by `POLLGATE_*` variables name the variable, not a file.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Sections of `pollgate.toml` and the keys each accepts.
pub const CONFIG_SCHEMA: &[(&str, &[&str])] = &[
    ("service", &["log_level"]),
    ("telegram", &["bot_token", "allowed_users"]),
    (
        "storage",
        &["backend", "database_path", "wal_mode", "record_ttl_secs"],
    ),
    ("gateway", &["host", "port", "api_key"]),
    (
        "delivery",
        &[
            "send_interval_ms",
            "cache_ttl_secs",
            "cache_capacity",
            "sweep_interval_secs",
        ],
    ),
];

/// Minimum Jaro-Winkler similarity for a spelling suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// A configuration problem, rendered by miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A top-level table Pollgate does not read.
    #[error("unknown config section `[{section}]`")]
    #[diagnostic(
        code(pollgate::config::unknown_section),
        help("{}", unknown_section_help(suggestion.as_deref()))
    )]
    UnknownSection {
        section: String,
        suggestion: Option<String>,
        #[label("not a Pollgate section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key that its section does not accept.
    #[error("unknown key `{key}` in `[{section}]`{}", from_env_suffix(.from_env))]
    #[diagnostic(
        code(pollgate::config::unknown_key),
        help("{}", unknown_key_help(section, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        section: String,
        key: String,
        /// Dotted path of the intended key, e.g. `telegram.bot_token`.
        suggestion: Option<String>,
        /// Keys accepted by `section`, comma separated.
        valid_keys: String,
        from_env: bool,
        #[label("not accepted here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type, or outside the accepted set.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(
        code(pollgate::config::invalid_value),
        help("`{key}` expects {expected}; as a variable it is {}", env_var_name(key))
    )]
    InvalidValue {
        key: String,
        detail: String,
        expected: String,
        #[label("rejected value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parses but breaks a semantic rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(pollgate::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(pollgate::config::other))]
    Other(String),
}

fn from_env_suffix(from_env: &bool) -> &'static str {
    if *from_env { " (from the environment)" } else { "" }
}

fn unknown_section_help(suggestion: Option<&str>) -> String {
    let sections: Vec<String> = CONFIG_SCHEMA.iter().map(|(s, _)| format!("[{s}]")).collect();
    match suggestion {
        Some(s) => format!("did you mean `[{s}]`? Pollgate reads {}", sections.join(", ")),
        None => format!("Pollgate reads {}", sections.join(", ")),
    }
}

fn unknown_key_help(section: &str, suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(path) => match path.split_once('.') {
            Some((target, key)) if target != section => format!(
                "`{key}` belongs in `[{target}]` (or set {})",
                env_var_name(path)
            ),
            _ => format!("did you mean `{path}`? `[{section}]` accepts: {valid_keys}"),
        },
        None => format!("`[{section}]` accepts: {valid_keys}"),
    }
}

/// `telegram.bot_token` -> `POLLGATE_TELEGRAM_BOT_TOKEN`.
pub fn env_var_name(path: &str) -> String {
    format!("POLLGATE_{}", path.replace('.', "_").to_ascii_uppercase())
}

/// Keys accepted by a section, or `None` for an unknown section.
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    CONFIG_SCHEMA
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// Best spelling match for `unknown` among `candidates`.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|&c| (c, strsim::jaro_winkler(unknown, c)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c.to_string())
}

/// Where an unknown key in `section` was most likely meant to go.
///
/// The exact key in another section wins; otherwise a misspelling within the
/// section; otherwise the closest spelling anywhere. Returned as a dotted path.
pub fn suggest_path(section: &str, key: &str) -> Option<String> {
    if let Some((other, _)) = CONFIG_SCHEMA
        .iter()
        .find(|(name, keys)| *name != section && keys.contains(&key))
    {
        return Some(format!("{other}.{key}"));
    }
    if let Some(own) = section_keys(section).and_then(|keys| suggest_key(key, keys)) {
        return Some(format!("{section}.{own}"));
    }
    CONFIG_SCHEMA
        .iter()
        .filter(|(name, _)| *name != section)
        .flat_map(|(name, keys)| keys.iter().map(move |k| (*name, *k)))
        .map(|(name, k)| (name, k, strsim::jaro_winkler(key, k)))
        .filter(|(_, _, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(name, k, _)| format!("{name}.{k}"))
}

/// Converts every error inside a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` pairs file paths with their contents; when an error comes
/// from one of them the diagnostic carries a span into that file.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let from_env = error
                .metadata
                .as_ref()
                .is_some_and(|m| m.name.contains("environment"));
            let mut path = error.path.clone();

            match &error.kind {
                Kind::UnknownField(field, _) => {
                    if path.last() == Some(field) {
                        path.pop();
                    }
                    match path.first() {
                        None => {
                            let names: Vec<&str> = CONFIG_SCHEMA.iter().map(|(s, _)| *s).collect();
                            let (span, src) = locate(&error, &format!("[{field}]"), toml_sources, |c| {
                                c.find(&format!("[{field}]"))
                            });
                            ConfigError::UnknownSection {
                                section: field.clone(),
                                suggestion: suggest_key(field, &names),
                                span,
                                src,
                            }
                        }
                        Some(section) => {
                            let (span, src) = locate(&error, field, toml_sources, |c| {
                                find_key_offset(c, section, field)
                            });
                            ConfigError::UnknownKey {
                                section: section.clone(),
                                key: field.clone(),
                                suggestion: suggest_path(section, field),
                                valid_keys: section_keys(section).unwrap_or_default().join(", "),
                                from_env,
                                span,
                                src,
                            }
                        }
                    }
                }
                Kind::UnknownVariant(actual, allowed) => invalid_value(
                    &error,
                    &path,
                    format!("`{actual}` is not a known option"),
                    allowed.iter().map(|a| format!("`{a}`")).collect::<Vec<_>>().join(" or "),
                    toml_sources,
                ),
                Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
                    invalid_value(
                        &error,
                        &path,
                        format!("found {actual}"),
                        expected.clone(),
                        toml_sources,
                    )
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn invalid_value(
    error: &figment::Error,
    path: &[String],
    detail: String,
    expected: String,
    toml_sources: &[(String, String)],
) -> ConfigError {
    let key = path.join(".");
    let (span, src) = match path {
        [section, field] => locate(error, field, toml_sources, |c| find_key_offset(c, section, field)),
        _ => (None, None),
    };
    ConfigError::InvalidValue {
        key,
        detail,
        expected,
        span,
        src,
    }
}

/// Finds the file an error came from and a span of `needle`'s length in it.
fn locate(
    error: &figment::Error,
    needle: &str,
    toml_sources: &[(String, String)],
    find: impl Fn(&str) -> Option<usize>,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(file)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let file = file.display().to_string();
    toml_sources
        .iter()
        .find(|(path, _)| *path == file)
        .and_then(|(path, content)| {
            let offset = find(content)?;
            Some((
                Some(SourceSpan::new(offset.into(), needle.len())),
                Some(NamedSource::new(path, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` as a key inside the `[section]` table of `content`.
///
/// Stops at the next table header, so a key of the same name in a later
/// section is not reported.
pub fn find_key_offset(content: &str, section: &str, field: &str) -> Option<usize> {
    let header = format!("[{section}]");
    let mut offset = content.find(&header)? + header.len();

    for line in content[offset..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Prints diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        if handler.render_report(&mut buf, error).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
