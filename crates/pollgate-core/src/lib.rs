// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Pollgate.
//!
//! This crate provides the domain types (tasks, records, delivery mappings),
//! the shared error type, and the adapter traits that storage backends and
//! chat transports implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::PollgateError;
pub use types::{
    AdapterType, ChatId, ChatMessage, DeliveryMapping, HealthStatus, PollAnswer, Record,
    RecordId, RecordStatus, Sender, SentPoll, Task, TransportEvent,
};

pub use traits::{
    CorrelationIndex, PluginAdapter, PollTransport, RecordStore, RecordStream, SessionRegistry,
};
