// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport trait for the bot platform (Telegram).

use async_trait::async_trait;

use crate::error::PollgateError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatId, SentPoll, TransportEvent};

/// Sends polls and messages to chats and yields inbound events.
#[async_trait]
pub trait PollTransport: PluginAdapter {
    /// Authenticates and starts receiving inbound events.
    async fn connect(&mut self) -> Result<(), PollgateError>;

    /// Sends a non-anonymous single-choice poll.
    async fn send_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
    ) -> Result<SentPoll, PollgateError>;

    /// Sends a plain text message.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), PollgateError>;

    /// Closes a previously sent poll so it no longer accepts votes.
    async fn stop_poll(&self, chat_id: ChatId, message_id: i32) -> Result<(), PollgateError>;

    /// Waits for the next inbound event, in arrival order.
    ///
    /// Returns `Ok(None)` once the transport has been disconnected and drained.
    async fn next_event(&self) -> Result<Option<TransportEvent>, PollgateError>;

    /// Stops dispatching new inbound events.
    async fn disconnect(&self) -> Result<(), PollgateError>;
}
