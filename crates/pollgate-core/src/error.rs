// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Pollgate.

use thiserror::Error;

/// The primary error type used across all Pollgate adapter traits and core operations.
#[derive(Debug, Error)]
pub enum PollgateError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A record, delivery mapping, or cache entry does not exist (or has expired).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A delivery for this (request, chat) pair is already recorded.
    #[error("delivery of request {request_id} to chat {chat_id} already recorded")]
    AlreadyRecorded { request_id: String, chat_id: i64 },

    /// The backing store failed (connection, query, serialization).
    #[error("store unavailable: {source}")]
    StoreUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store was used after `close()`.
    #[error("store is closed")]
    StoreClosed,

    /// The chat transport failed to deliver or receive.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// User-submitted data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PollgateError {
    /// Shorthand for a missing record.
    pub fn record_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "record",
            id: id.into(),
        }
    }

    /// Shorthand for an unknown poll id in the correlation index.
    pub fn poll_not_found(poll_id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "poll",
            id: poll_id.into(),
        }
    }

    /// Wraps any error as [`PollgateError::StoreUnavailable`].
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreUnavailable {
            source: Box::new(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_recorded(&self) -> bool {
        matches!(self, Self::AlreadyRecorded { .. })
    }
}
