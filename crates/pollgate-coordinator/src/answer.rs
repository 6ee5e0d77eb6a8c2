// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The answer loop: resolves records from poll answers, first answer wins.

use std::time::Duration;

use pollgate_core::{PollAnswer, PollgateError, RecordId, TransportEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Coordinator;

/// Pause after a failed `next_event` before polling again.
const EVENT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What happened to one poll answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The answer resolved this record.
    Resolved(RecordId),
    /// Vote retraction, unknown poll, expired or already resolved record.
    Ignored,
}

impl Coordinator {
    pub(crate) async fn run_answer_loop(&self, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                event = self.transport.next_event() => event,
                _ = cancel.cancelled() => {
                    debug!("answer loop stopping");
                    break;
                }
            };

            match event {
                Ok(Some(event)) => self.handle_event(event).await,
                Ok(None) => {
                    info!("transport closed, answer loop stopping");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to receive transport event");
                    tokio::select! {
                        _ = tokio::time::sleep(EVENT_RETRY_DELAY) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }
    }

    /// Dispatches one inbound event. Errors are logged, never propagated.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::PollAnswer(answer) => {
                if let Err(e) = self.handle_answer(&answer).await {
                    error!(poll_id = %answer.poll_id, error = %e, "failed to handle poll answer");
                }
            }
            TransportEvent::ChatMessage(msg) => {
                if let Err(e) = self.handle_chat_message(&msg).await {
                    error!(chat_id = %msg.chat_id, error = %e, "failed to handle chat message");
                }
            }
        }
    }

    /// Resolves the record behind a poll answer and stops the sibling polls.
    ///
    /// The answering chat's own poll is left open; every other delivery of the
    /// record is withdrawn and stopped.
    pub async fn handle_answer(&self, answer: &PollAnswer) -> Result<AnswerOutcome, PollgateError> {
        let Some(option) = answer.selected_option else {
            debug!(poll_id = %answer.poll_id, "vote retracted, ignoring");
            return Ok(AnswerOutcome::Ignored);
        };

        let mapping = match self.index.resolve(&answer.poll_id).await {
            Ok(mapping) => mapping,
            Err(e) if e.is_not_found() => {
                debug!(poll_id = %answer.poll_id, "answer for unknown poll, dropping");
                return Ok(AnswerOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };
        let id = mapping.request_id.clone();

        let gate = self.write_gate.lock().await;
        let mut record = match self.service.get(&id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                debug!(request_id = %id, "answer for expired record, dropping");
                return Ok(AnswerOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        match record.resolve(option) {
            Ok(true) => {}
            Ok(false) => {
                debug!(request_id = %id, "record already resolved, dropping answer");
                return Ok(AnswerOutcome::Ignored);
            }
            Err(e) => {
                warn!(request_id = %id, option, error = %e, "answer out of range, dropping");
                return Ok(AnswerOutcome::Ignored);
            }
        }

        self.service.save(&record).await?;
        // The id stays queued until the mappings are gone, so the send loop
        // can finish a withdrawal that fails here.
        let withdrawn = self.index.withdraw_all(&id).await?;
        self.service.queue().complete(&id);
        drop(gate);

        info!(
            request_id = %id,
            poll_id = %answer.poll_id,
            chat_id = %mapping.chat_id,
            sender_id = answer.sender_id,
            option,
            "poll answered"
        );

        for sibling in withdrawn.iter().filter(|m| m.chat_id != mapping.chat_id) {
            self.stop_quietly(sibling.chat_id, sibling.message_id).await;
        }

        Ok(AnswerOutcome::Resolved(id))
    }
}
