// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory backend with injectable write failures.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pollgate_core::{
    AdapterType, ChatId, CorrelationIndex, DeliveryMapping, HealthStatus, PluginAdapter,
    PollgateError, Record, RecordId, RecordStore, RecordStream, SessionRegistry,
};
use pollgate_storage::MemoryStore;

/// Wraps a [`MemoryStore`]; the next `n` record writes or withdrawals can be
/// made to fail with `StoreUnavailable`.
pub struct FaultyStore {
    inner: MemoryStore,
    failing_puts: AtomicUsize,
    failing_withdrawals: AtomicUsize,
}

impl FaultyStore {
    pub fn new(record_ttl: Duration) -> Self {
        Self {
            inner: MemoryStore::new(record_ttl),
            failing_puts: AtomicUsize::new(0),
            failing_withdrawals: AtomicUsize::new(0),
        }
    }

    /// Makes the next `n` calls to `put` fail.
    pub fn fail_next_puts(&self, n: usize) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` calls to `withdraw_all` fail.
    pub fn fail_next_withdrawals(&self, n: usize) {
        self.failing_withdrawals.store(n, Ordering::SeqCst);
    }

    fn trip(counter: &AtomicUsize, op: &str) -> Result<(), PollgateError> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(PollgateError::store(std::io::Error::other(format!(
                "injected {op} failure"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FaultyStore {
    fn name(&self) -> &str {
        "faulty-memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PollgateError> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn put(&self, record: &Record) -> Result<(), PollgateError> {
        Self::trip(&self.failing_puts, "put")?;
        self.inner.put(record).await
    }

    async fn get(&self, id: &RecordId) -> Result<Record, PollgateError> {
        self.inner.get(id).await
    }

    fn iterate(&self) -> RecordStream<'_> {
        self.inner.iterate()
    }

    async fn delete(&self, id: &RecordId) -> Result<(), PollgateError> {
        self.inner.delete(id).await
    }

    async fn sweep_expired(&self) -> Result<Vec<RecordId>, PollgateError> {
        self.inner.sweep_expired().await
    }

    async fn close(&self) -> Result<(), PollgateError> {
        RecordStore::close(&self.inner).await
    }
}

#[async_trait]
impl SessionRegistry for FaultyStore {
    async fn admit(&self, chat_id: ChatId) -> Result<bool, PollgateError> {
        self.inner.admit(chat_id).await
    }

    async fn revoke(&self, chat_id: ChatId) -> Result<bool, PollgateError> {
        self.inner.revoke(chat_id).await
    }

    async fn members(&self) -> Result<BTreeSet<ChatId>, PollgateError> {
        self.inner.members().await
    }
}

#[async_trait]
impl CorrelationIndex for FaultyStore {
    async fn record_delivery(&self, mapping: &DeliveryMapping) -> Result<(), PollgateError> {
        self.inner.record_delivery(mapping).await
    }

    async fn has_delivered(
        &self,
        request_id: &RecordId,
        chat_id: ChatId,
    ) -> Result<bool, PollgateError> {
        self.inner.has_delivered(request_id, chat_id).await
    }

    async fn resolve(&self, poll_id: &str) -> Result<DeliveryMapping, PollgateError> {
        self.inner.resolve(poll_id).await
    }

    async fn withdraw_all(
        &self,
        request_id: &RecordId,
    ) -> Result<Vec<DeliveryMapping>, PollgateError> {
        Self::trip(&self.failing_withdrawals, "withdraw")?;
        self.inner.withdraw_all(request_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollgate_core::Task;

    #[tokio::test]
    async fn injected_failures_are_counted_down() {
        let store = FaultyStore::new(Duration::from_secs(60));
        let record = Record::new(Task::new("Pick", vec!["A".into(), "B".into()]));

        store.fail_next_puts(1);
        assert!(matches!(
            store.put(&record).await,
            Err(PollgateError::StoreUnavailable { .. })
        ));
        store.put(&record).await.unwrap();
        assert_eq!(store.get(&record.id).await.unwrap(), record);

        store.fail_next_withdrawals(2);
        assert!(store.withdraw_all(&record.id).await.is_err());
        assert!(store.withdraw_all(&record.id).await.is_err());
        assert!(store.withdraw_all(&record.id).await.unwrap().is_empty());
    }
}
