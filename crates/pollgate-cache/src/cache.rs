// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded, time-limited mirror of recently used records.

use std::time::Duration;

use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use pollgate_config::model::DeliveryConfig;
use pollgate_core::{Record, RecordId};
use thiserror::Error;

/// The record is not cached, or its entry has outlived the TTL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {0} is not cached")]
pub struct CacheMiss(pub RecordId);

/// Record cache with a fixed TTL counted from insertion.
///
/// Reads never extend an entry's lifetime.
#[derive(Clone)]
pub struct RecordCache {
    inner: Cache<RecordId, Record>,
}

impl RecordCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    pub async fn get(&self, id: &RecordId) -> Result<Record, CacheMiss> {
        self.inner.get(id).await.ok_or_else(|| CacheMiss(id.clone()))
    }

    /// Stores `record`, replacing whatever is cached for its id.
    pub async fn put(&self, record: &Record) {
        let value = record.clone();
        self.inner
            .entry(record.id.clone())
            .and_compute_with(|_| async move { Op::Put(value) })
            .await;
    }

    /// Stores `record` unless the cached copy is at least as recent.
    ///
    /// Returns whether the entry was written.
    pub async fn fill(&self, record: &Record) -> bool {
        let value = record.clone();
        let result = self
            .inner
            .entry(record.id.clone())
            .and_compute_with(|current| async move {
                match current {
                    Some(entry) if entry.value().updated_at >= value.updated_at => Op::Nop,
                    _ => Op::Put(value),
                }
            })
            .await;
        !matches!(result, CompResult::Unchanged(_))
    }

    pub async fn invalidate(&self, id: &RecordId) {
        self.inner.invalidate(id).await;
    }
}
