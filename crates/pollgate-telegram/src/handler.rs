// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of Telegram updates into transport events.
//!
//! Poll answers and sent polls are read through their Bot API wire form,
//! which stays stable across teloxide releases even where the Rust field
//! types change.

use pollgate_core::error::PollgateError;
use pollgate_core::types::{ChatId, ChatMessage, PollAnswer, Sender, SentPoll};
use serde_json::Value;
use teloxide::prelude::*;

/// Converts an inbound message. Non-text messages keep `text = None`.
pub fn to_chat_message(msg: &Message) -> ChatMessage {
    let sender = msg.from.as_ref().map(|user| Sender {
        id: user.id.0,
        username: user.username.clone(),
    });
    ChatMessage {
        chat_id: ChatId(msg.chat.id.0),
        sender,
        text: msg.text().map(str::to_string),
    }
}

/// Converts a poll answer update.
pub fn to_poll_answer(answer: &teloxide::types::PollAnswer) -> Result<PollAnswer, PollgateError> {
    let wire = serde_json::to_value(answer).map_err(|e| PollgateError::Transport {
        message: "failed to encode poll answer".into(),
        source: Some(Box::new(e)),
    })?;
    poll_answer_from_wire(&wire)
}

/// Reads a Bot API `PollAnswer` object.
///
/// An empty `option_ids` array is a retracted vote and maps to
/// `selected_option = None`. Anonymous chat voters carry no user id.
pub fn poll_answer_from_wire(wire: &Value) -> Result<PollAnswer, PollgateError> {
    let poll_id = wire
        .get("poll_id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("poll answer without poll_id"))?
        .to_string();
    let selected_option = wire
        .get("option_ids")
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(Value::as_u64)
        .map(|o| o as usize);
    let sender_id = wire
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(Value::as_u64);

    Ok(PollAnswer {
        poll_id,
        sender_id,
        selected_option,
    })
}

/// Extracts the provider identifiers from the message returned by `sendPoll`.
pub fn sent_poll_from(msg: &Message) -> Result<SentPoll, PollgateError> {
    let poll = msg
        .poll()
        .ok_or_else(|| malformed("sendPoll returned a message without a poll"))?;
    let wire = serde_json::to_value(poll).map_err(|e| PollgateError::Transport {
        message: "failed to encode sent poll".into(),
        source: Some(Box::new(e)),
    })?;
    let poll_id = wire
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("sent poll without id"))?
        .to_string();
    Ok(SentPoll {
        poll_id,
        message_id: msg.id.0,
    })
}

fn malformed(message: &str) -> PollgateError {
    PollgateError::Transport {
        message: message.to_string(),
        source: None,
    }
}
