// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and the Pollgate services.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::PollgateError;

/// Maximum length (in characters) of a poll question.
pub const MAX_MESSAGE_LEN: usize = 300;

/// Maximum length (in characters) of a single poll option.
pub const MAX_BUTTON_LEN: usize = 100;

/// Telegram polls need between 2 and 10 options.
pub const MIN_BUTTONS: usize = 2;
pub const MAX_BUTTONS: usize = 10;

/// Unique identifier for a poll request record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Telegram chat identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
}

/// User-submitted poll content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub message: String,
    pub buttons: Vec<String>,
}

impl Task {
    pub fn new(message: impl Into<String>, buttons: Vec<String>) -> Self {
        Self {
            message: message.into(),
            buttons,
        }
    }

    /// Checks the task against the poll limits.
    ///
    /// All problems are reported at once, separated by `", "`.
    pub fn validate(&self) -> Result<(), PollgateError> {
        let mut problems = Vec::new();

        let message_len = self.message.trim().chars().count();
        if message_len == 0 {
            problems.push("message must not be empty".to_string());
        } else if self.message.chars().count() > MAX_MESSAGE_LEN {
            problems.push(format!(
                "message must be at most {MAX_MESSAGE_LEN} characters"
            ));
        }

        if self.buttons.len() < MIN_BUTTONS || self.buttons.len() > MAX_BUTTONS {
            problems.push(format!(
                "buttons must contain between {MIN_BUTTONS} and {MAX_BUTTONS} options, got {}",
                self.buttons.len()
            ));
        }

        for (i, button) in self.buttons.iter().enumerate() {
            if button.trim().is_empty() {
                problems.push(format!("buttons[{i}] must not be empty"));
            } else if button.chars().count() > MAX_BUTTON_LEN {
                problems.push(format!(
                    "buttons[{i}] must be at most {MAX_BUTTON_LEN} characters"
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PollgateError::Validation(problems.join(", ")))
        }
    }
}

/// Lifecycle state of a [`Record`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum RecordStatus {
    /// Created, not yet delivered to any chat.
    Pending,
    /// Delivered to at least one chat, waiting for an answer.
    Delivering,
    /// Answered. Terminal.
    Done,
}

/// A poll request and its resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub task: Task,
    pub status: RecordStatus,
    pub selected_option: Option<usize>,
    pub resolved_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Creates a pending record with a fresh id.
    pub fn new(task: Task) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::generate(),
            task,
            status: RecordStatus::Pending,
            selected_option: None,
            resolved_text: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == RecordStatus::Done
    }

    /// Moves a pending record to `Delivering`. Returns `false` if it was not pending.
    pub fn mark_delivering(&mut self) -> bool {
        if self.status != RecordStatus::Pending {
            return false;
        }
        self.status = RecordStatus::Delivering;
        self.updated_at = Utc::now();
        true
    }

    /// Resolves the record with the chosen option.
    ///
    /// Returns `Ok(false)` without touching the record if it is already done;
    /// the first answer wins.
    pub fn resolve(&mut self, option: usize) -> Result<bool, PollgateError> {
        if self.is_done() {
            return Ok(false);
        }
        let text = self.task.buttons.get(option).cloned().ok_or_else(|| {
            PollgateError::Validation(format!(
                "option {option} out of range for record {} with {} buttons",
                self.id,
                self.task.buttons.len()
            ))
        })?;
        self.status = RecordStatus::Done;
        self.selected_option = Some(option);
        self.resolved_text = Some(text);
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Checks the `resolved_text` / `status` invariant.
    pub fn is_consistent(&self) -> bool {
        match (self.status, self.selected_option, &self.resolved_text) {
            (RecordStatus::Done, Some(opt), Some(text)) => {
                self.task.buttons.get(opt) == Some(text)
            }
            (RecordStatus::Done, _, _) => false,
            (_, None, None) => true,
            _ => false,
        }
    }
}

/// One delivered poll: the link between a request, a chat, and the provider's poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMapping {
    pub request_id: RecordId,
    pub chat_id: ChatId,
    pub poll_id: String,
    pub message_id: i32,
    pub delivered_at: DateTime<Utc>,
}

/// Identifiers the transport assigns to a freshly sent poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPoll {
    pub poll_id: String,
    pub message_id: i32,
}

/// The user behind an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub username: Option<String>,
}

/// A text message sent to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub chat_id: ChatId,
    pub sender: Option<Sender>,
    pub text: Option<String>,
}

/// A vote on one of our polls.
///
/// `selected_option` is `None` when the user retracted their vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAnswer {
    pub poll_id: String,
    pub sender_id: Option<u64>,
    pub selected_option: Option<usize>,
}

/// Events yielded by a [`PollTransport`](crate::traits::PollTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ChatMessage(ChatMessage),
    PollAnswer(PollAnswer),
}
