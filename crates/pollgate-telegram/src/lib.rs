// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for Pollgate.
//!
//! Implements [`PollTransport`] for the Telegram Bot API via teloxide:
//! long polling for chat messages and poll answers, and outbound polls,
//! text messages and poll stops.

pub mod handler;

use async_trait::async_trait;
use pollgate_config::model::TelegramConfig;
use pollgate_core::error::PollgateError;
use pollgate_core::traits::{PluginAdapter, PollTransport};
use pollgate_core::types::{AdapterType, ChatId, HealthStatus, SentPoll, TransportEvent};
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::{InputPollOption, MessageId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Inbound events buffered between the dispatcher and the answer loop.
const INBOUND_BUFFER: usize = 256;

/// Telegram transport implementing [`PollTransport`].
pub struct TelegramTransport {
    bot: Bot,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<TransportEvent>>,
    /// Handed to the dispatcher on connect, so the channel closes once the
    /// dispatcher stops.
    inbound_tx: Option<mpsc::Sender<TransportEvent>>,
    shutdown: Option<ShutdownToken>,
}

impl TelegramTransport {
    /// Creates a new transport. Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, PollgateError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            PollgateError::Config("telegram.bot_token is required for the Telegram transport".into())
        })?;

        if token.trim().is_empty() {
            return Err(PollgateError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        Ok(Self {
            bot: Bot::new(token),
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx: Some(inbound_tx),
            shutdown: None,
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn request_err(action: &str, e: teloxide::RequestError) -> PollgateError {
    PollgateError::Transport {
        message: format!("failed to {action}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, PollgateError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }
}

#[async_trait]
impl PollTransport for TelegramTransport {
    async fn connect(&mut self) -> Result<(), PollgateError> {
        let Some(tx) = self.inbound_tx.take() else {
            return Ok(()); // Already connected
        };

        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| request_err("authenticate bot (getMe)", e))?;
        info!(bot = %me.username(), "starting Telegram long polling");

        let message_tx = tx.clone();
        let answer_tx = tx;
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(move |msg: Message| {
                let tx = message_tx.clone();
                async move {
                    let event = TransportEvent::ChatMessage(handler::to_chat_message(&msg));
                    if tx.send(event).await.is_err() {
                        warn!("inbound channel closed, dropping message");
                    }
                    respond(())
                }
            }))
            .branch(Update::filter_poll_answer().endpoint(
                move |answer: teloxide::types::PollAnswer| {
                    let tx = answer_tx.clone();
                    async move {
                        match handler::to_poll_answer(&answer) {
                            Ok(answer) => {
                                if tx.send(TransportEvent::PollAnswer(answer)).await.is_err() {
                                    warn!("inbound channel closed, dropping poll answer");
                                }
                            }
                            Err(e) => error!(error = %e, "failed to read poll answer"),
                        }
                        respond(())
                    }
                },
            ));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {}) // Silently ignore other updates
            .build();
        self.shutdown = Some(dispatcher.shutdown_token());

        tokio::spawn(async move {
            dispatcher.dispatch().await;
            debug!("Telegram dispatcher stopped");
        });
        Ok(())
    }

    async fn send_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
    ) -> Result<SentPoll, PollgateError> {
        let options = options.iter().cloned().map(InputPollOption::new);
        let sent = self
            .bot
            .send_poll(teloxide::types::ChatId(chat_id.0), question, options)
            .is_anonymous(false)
            .allows_multiple_answers(false)
            .await
            .map_err(|e| request_err("send poll", e))?;
        handler::sent_poll_from(&sent)
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), PollgateError> {
        self.bot
            .send_message(teloxide::types::ChatId(chat_id.0), text)
            .await
            .map_err(|e| request_err("send message", e))?;
        Ok(())
    }

    async fn stop_poll(&self, chat_id: ChatId, message_id: i32) -> Result<(), PollgateError> {
        self.bot
            .stop_poll(teloxide::types::ChatId(chat_id.0), MessageId(message_id))
            .await
            .map_err(|e| request_err("stop poll", e))?;
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<TransportEvent>, PollgateError> {
        let mut rx = self.inbound_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn disconnect(&self) -> Result<(), PollgateError> {
        let Some(token) = &self.shutdown else {
            return Ok(());
        };
        match token.shutdown() {
            Ok(stopped) => {
                stopped.await;
                info!("Telegram long polling stopped");
            }
            // Dispatcher is not running (never started or already stopped).
            Err(_) => debug!("Telegram dispatcher was idle at shutdown"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
            allowed_users: vec![],
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(TelegramTransport::new(&config(None)).is_err());
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramTransport::new(&config(Some("  "))).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        assert!(
            TelegramTransport::new(&config(Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11")))
                .is_ok()
        );
    }

    #[test]
    fn plugin_adapter_metadata() {
        let transport = TelegramTransport::new(&config(Some("test:token"))).unwrap();
        assert_eq!(transport.name(), "telegram");
        assert_eq!(transport.version(), semver::Version::new(0, 1, 0));
        assert_eq!(transport.adapter_type(), AdapterType::Transport);
    }

    #[tokio::test]
    async fn disconnect_before_connect_is_a_noop() {
        let transport = TelegramTransport::new(&config(Some("test:token"))).unwrap();
        assert!(transport.disconnect().await.is_ok());
    }
}
