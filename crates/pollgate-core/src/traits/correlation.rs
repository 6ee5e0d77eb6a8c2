// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation index trait linking deliveries to provider poll ids.

use async_trait::async_trait;

use crate::error::PollgateError;
use crate::types::{ChatId, DeliveryMapping, RecordId};

/// Tracks which (request, chat) pairs have a delivered poll, and which
/// request a provider poll id belongs to.
#[async_trait]
pub trait CorrelationIndex: Send + Sync + 'static {
    /// Records a confirmed delivery.
    ///
    /// Fails with `AlreadyRecorded` if the (request, chat) pair already has a
    /// mapping; the existing mapping is left untouched.
    async fn record_delivery(&self, mapping: &DeliveryMapping) -> Result<(), PollgateError>;

    /// Whether the request already has a poll in this chat.
    async fn has_delivered(
        &self,
        request_id: &RecordId,
        chat_id: ChatId,
    ) -> Result<bool, PollgateError>;

    /// Looks up the delivery behind a provider poll id. `NotFound` if unknown.
    async fn resolve(&self, poll_id: &str) -> Result<DeliveryMapping, PollgateError>;

    /// Removes and returns every mapping of the request.
    async fn withdraw_all(
        &self,
        request_id: &RecordId,
    ) -> Result<Vec<DeliveryMapping>, PollgateError>;
}
