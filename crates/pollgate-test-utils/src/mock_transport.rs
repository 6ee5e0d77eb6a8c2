// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock poll transport for deterministic testing.
//!
//! `MockTransport` implements `PollTransport` with injectable inbound events,
//! captured outbound calls, and per-chat send failures.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use pollgate_core::{
    AdapterType, ChatId, ChatMessage, HealthStatus, PluginAdapter, PollAnswer, PollTransport,
    PollgateError, Sender, SentPoll, TransportEvent,
};

/// One captured `send_poll` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPollCall {
    pub chat_id: ChatId,
    pub question: String,
    pub options: Vec<String>,
    pub poll_id: String,
    pub message_id: i32,
}

/// A mock chat transport for testing.
///
/// Poll ids are `poll-{n}` and message ids `n`, counting from 1 in send order.
pub struct MockTransport {
    inbound: Mutex<VecDeque<TransportEvent>>,
    notify: Notify,
    closed: AtomicBool,
    polls: Mutex<Vec<SentPollCall>>,
    messages: Mutex<Vec<(ChatId, String)>>,
    stops: Mutex<Vec<(ChatId, i32)>>,
    failing: Mutex<HashSet<ChatId>>,
    next_id: AtomicI32,
}

impl MockTransport {
    /// Create a new mock transport with empty queues.
    pub fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            polls: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            next_id: AtomicI32::new(1),
        }
    }

    /// Queue an inbound event for `next_event()`.
    pub async fn inject(&self, event: TransportEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Queue a vote for `option` on `poll_id`.
    pub async fn inject_answer(&self, poll_id: &str, option: usize) {
        self.inject(TransportEvent::PollAnswer(PollAnswer {
            poll_id: poll_id.to_string(),
            sender_id: Some(1),
            selected_option: Some(option),
        }))
        .await;
    }

    /// Queue a text message from user `user_id` in `chat_id`.
    pub async fn inject_text(
        &self,
        chat_id: ChatId,
        user_id: u64,
        username: Option<&str>,
        text: &str,
    ) {
        self.inject(TransportEvent::ChatMessage(ChatMessage {
            chat_id,
            sender: Some(Sender {
                id: user_id,
                username: username.map(String::from),
            }),
            text: Some(text.to_string()),
        }))
        .await;
    }

    /// Make every future `send_poll` to `chat_id` fail.
    pub async fn fail_chat(&self, chat_id: ChatId) {
        self.failing.lock().await.insert(chat_id);
    }

    /// Undo [`fail_chat`](Self::fail_chat).
    pub async fn heal_chat(&self, chat_id: ChatId) {
        self.failing.lock().await.remove(&chat_id);
    }

    /// All successful `send_poll` calls, in order.
    pub async fn sent_polls(&self) -> Vec<SentPollCall> {
        self.polls.lock().await.clone()
    }

    /// Successful `send_poll` calls to one chat.
    pub async fn polls_to(&self, chat_id: ChatId) -> Vec<SentPollCall> {
        self.polls
            .lock()
            .await
            .iter()
            .filter(|p| p.chat_id == chat_id)
            .cloned()
            .collect()
    }

    /// All `send_message` calls, in order.
    pub async fn sent_messages(&self) -> Vec<(ChatId, String)> {
        self.messages.lock().await.clone()
    }

    /// All `stop_poll` calls, in order.
    pub async fn stop_calls(&self) -> Vec<(ChatId, i32)> {
        self.stops.lock().await.clone()
    }

    /// Number of events not yet taken by `next_event()`.
    pub async fn pending_events(&self) -> usize {
        self.inbound.lock().await.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, PollgateError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl PollTransport for MockTransport {
    async fn connect(&mut self) -> Result<(), PollgateError> {
        Ok(())
    }

    async fn send_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
    ) -> Result<SentPoll, PollgateError> {
        if self.failing.lock().await.contains(&chat_id) {
            return Err(PollgateError::Transport {
                message: format!("chat {chat_id} unreachable"),
                source: None,
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let call = SentPollCall {
            chat_id,
            question: question.to_string(),
            options: options.to_vec(),
            poll_id: format!("poll-{n}"),
            message_id: n,
        };
        let sent = SentPoll {
            poll_id: call.poll_id.clone(),
            message_id: n,
        };
        self.polls.lock().await.push(call);
        Ok(sent)
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), PollgateError> {
        self.messages.lock().await.push((chat_id, text.to_string()));
        Ok(())
    }

    async fn stop_poll(&self, chat_id: ChatId, message_id: i32) -> Result<(), PollgateError> {
        self.stops.lock().await.push((chat_id, message_id));
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<TransportEvent>, PollgateError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(Some(event));
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.notify.notified().await;
        }
    }

    async fn disconnect(&self) -> Result<(), PollgateError> {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        Ok(())
    }
}
