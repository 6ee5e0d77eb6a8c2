// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store trait for durable poll request storage.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::PollgateError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Record, RecordId};

/// Lazy stream of live records produced by [`RecordStore::iterate`].
pub type RecordStream<'a> = BoxStream<'a, Result<Record, PollgateError>>;

/// Durable keyed storage of [`Record`]s.
///
/// Records expire after the backend's retention TTL, counted from the last
/// [`put`](RecordStore::put). Expired records are invisible to `get` and
/// `iterate` even before [`sweep_expired`](RecordStore::sweep_expired)
/// physically removes them. Every method fails with
/// [`PollgateError::StoreClosed`] once [`close`](RecordStore::close) has run.
#[async_trait]
pub trait RecordStore: PluginAdapter {
    /// Inserts or overwrites the record and resets its TTL.
    async fn put(&self, record: &Record) -> Result<(), PollgateError>;

    /// Fetches a live record. Fails with `NotFound` if absent or expired.
    async fn get(&self, id: &RecordId) -> Result<Record, PollgateError>;

    /// Streams every live record in unspecified order.
    ///
    /// Each call starts a fresh traversal. Concurrent writes may or may not
    /// be observed but never break the traversal.
    fn iterate(&self) -> RecordStream<'_>;

    /// Deletes the record and its delivery mappings. Absent ids are a no-op.
    async fn delete(&self, id: &RecordId) -> Result<(), PollgateError>;

    /// Removes expired records. Returns the ids that were removed.
    async fn sweep_expired(&self) -> Result<Vec<RecordId>, PollgateError>;

    /// Releases the backend. No operation is permitted afterwards.
    async fn close(&self) -> Result<(), PollgateError>;
}
