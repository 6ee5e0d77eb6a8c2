// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry trait: which chats currently receive polls.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::PollgateError;
use crate::types::ChatId;

/// Set of chats eligible to receive polls.
#[async_trait]
pub trait SessionRegistry: Send + Sync + 'static {
    /// Adds the chat. Returns `true` if it was not already a member.
    async fn admit(&self, chat_id: ChatId) -> Result<bool, PollgateError>;

    /// Removes the chat. Returns `true` if it was a member.
    async fn revoke(&self, chat_id: ChatId) -> Result<bool, PollgateError>;

    /// Snapshot of current members.
    async fn members(&self) -> Result<BTreeSet<ChatId>, PollgateError>;
}
