// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process backend. Nothing survives a restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use futures::StreamExt;
use futures::stream;
use tokio::sync::Mutex;
use tracing::debug;

use pollgate_core::{
    AdapterType, ChatId, CorrelationIndex, DeliveryMapping, HealthStatus, PluginAdapter,
    PollgateError, Record, RecordId, RecordStore, RecordStream, SessionRegistry,
};

struct StoredRecord {
    record: Record,
    /// `None` when the TTL overflows `Instant`; such records never expire.
    expires_at: Option<Instant>,
}

impl StoredRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Both directions of the correlation index, kept under one lock so
/// `record_delivery` and `withdraw_all` are atomic.
#[derive(Default)]
struct DeliveryTable {
    by_pair: HashMap<(RecordId, ChatId), DeliveryMapping>,
    by_poll: HashMap<String, (RecordId, ChatId)>,
}

impl DeliveryTable {
    fn take_request(&mut self, request_id: &RecordId) -> Vec<DeliveryMapping> {
        let keys: Vec<(RecordId, ChatId)> = self
            .by_pair
            .keys()
            .filter(|(rid, _)| rid == request_id)
            .cloned()
            .collect();
        let mut taken: Vec<DeliveryMapping> = keys
            .iter()
            .filter_map(|key| self.by_pair.remove(key))
            .collect();
        for mapping in &taken {
            self.by_poll.remove(&mapping.poll_id);
        }
        taken.sort_by_key(|m| m.chat_id);
        taken
    }
}

/// Memory-backed record store, session registry and correlation index.
pub struct MemoryStore {
    records: DashMap<RecordId, StoredRecord>,
    sessions: DashSet<ChatId>,
    deliveries: Mutex<DeliveryTable>,
    record_ttl: Duration,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new(record_ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            sessions: DashSet::new(),
            deliveries: Mutex::new(DeliveryTable::default()),
            record_ttl,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), PollgateError> {
        if self.closed.load(Ordering::Acquire) {
            Err(PollgateError::StoreClosed)
        } else {
            Ok(())
        }
    }

    fn live_record(&self, id: &RecordId) -> Option<Record> {
        let entry = self.records.get(id)?;
        entry.is_live(Instant::now()).then(|| entry.record.clone())
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PollgateError> {
        self.ensure_open()?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, record: &Record) -> Result<(), PollgateError> {
        self.ensure_open()?;
        let stored = StoredRecord {
            record: record.clone(),
            expires_at: Instant::now().checked_add(self.record_ttl),
        };
        self.records.insert(record.id.clone(), stored);
        Ok(())
    }

    async fn get(&self, id: &RecordId) -> Result<Record, PollgateError> {
        self.ensure_open()?;
        self.live_record(id)
            .ok_or_else(|| PollgateError::record_not_found(id.as_str()))
    }

    fn iterate(&self) -> RecordStream<'_> {
        if let Err(e) = self.ensure_open() {
            return stream::once(async move { Err(e) }).boxed();
        }
        // Keys are snapshotted up front; each record is fetched when polled.
        let keys: Vec<RecordId> = self.records.iter().map(|e| e.key().clone()).collect();
        stream::iter(keys)
            .filter_map(move |id| async move {
                if let Err(e) = self.ensure_open() {
                    return Some(Err(e));
                }
                self.live_record(&id).map(Ok)
            })
            .boxed()
    }

    async fn delete(&self, id: &RecordId) -> Result<(), PollgateError> {
        self.ensure_open()?;
        self.records.remove(id);
        self.deliveries.lock().await.take_request(id);
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<Vec<RecordId>, PollgateError> {
        self.ensure_open()?;
        let now = Instant::now();
        let expired: Vec<RecordId> = self
            .records
            .iter()
            .filter(|e| !e.value().is_live(now))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = Vec::new();
        let mut deliveries = self.deliveries.lock().await;
        for id in expired {
            if self
                .records
                .remove_if(&id, |_, stored| !stored.is_live(now))
                .is_some()
            {
                deliveries.take_request(&id);
                removed.push(id);
            }
        }
        if !removed.is_empty() {
            debug!(removed = removed.len(), "swept expired records");
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<(), PollgateError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl SessionRegistry for MemoryStore {
    async fn admit(&self, chat_id: ChatId) -> Result<bool, PollgateError> {
        self.ensure_open()?;
        Ok(self.sessions.insert(chat_id))
    }

    async fn revoke(&self, chat_id: ChatId) -> Result<bool, PollgateError> {
        self.ensure_open()?;
        Ok(self.sessions.remove(&chat_id).is_some())
    }

    async fn members(&self) -> Result<BTreeSet<ChatId>, PollgateError> {
        self.ensure_open()?;
        Ok(self.sessions.iter().map(|c| *c).collect())
    }
}

#[async_trait]
impl CorrelationIndex for MemoryStore {
    async fn record_delivery(&self, mapping: &DeliveryMapping) -> Result<(), PollgateError> {
        self.ensure_open()?;
        let key = (mapping.request_id.clone(), mapping.chat_id);
        let mut table = self.deliveries.lock().await;
        if table.by_pair.contains_key(&key) {
            return Err(PollgateError::AlreadyRecorded {
                request_id: mapping.request_id.0.clone(),
                chat_id: mapping.chat_id.0,
            });
        }
        if table.by_poll.contains_key(&mapping.poll_id) {
            return Err(PollgateError::Internal(format!(
                "poll id {} is already mapped",
                mapping.poll_id
            )));
        }
        table.by_poll.insert(mapping.poll_id.clone(), key.clone());
        table.by_pair.insert(key, mapping.clone());
        Ok(())
    }

    async fn has_delivered(
        &self,
        request_id: &RecordId,
        chat_id: ChatId,
    ) -> Result<bool, PollgateError> {
        self.ensure_open()?;
        let table = self.deliveries.lock().await;
        Ok(table.by_pair.contains_key(&(request_id.clone(), chat_id)))
    }

    async fn resolve(&self, poll_id: &str) -> Result<DeliveryMapping, PollgateError> {
        self.ensure_open()?;
        let table = self.deliveries.lock().await;
        table
            .by_poll
            .get(poll_id)
            .and_then(|key| table.by_pair.get(key))
            .cloned()
            .ok_or_else(|| PollgateError::poll_not_found(poll_id))
    }

    async fn withdraw_all(
        &self,
        request_id: &RecordId,
    ) -> Result<Vec<DeliveryMapping>, PollgateError> {
        self.ensure_open()?;
        Ok(self.deliveries.lock().await.take_request(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pollgate_core::Task;
    use std::sync::Arc;

    fn pick() -> Record {
        Record::new(Task::new("Pick", vec!["A".into(), "B".into()]))
    }

    fn mapping(record: &Record, chat: i64, poll: &str) -> DeliveryMapping {
        DeliveryMapping {
            request_id: record.id.clone(),
            chat_id: ChatId(chat),
            poll_id: poll.into(),
            message_id: 1,
            delivered_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let r = pick();
        store.put(&r).await.unwrap();
        assert_eq!(store.get(&r.id).await.unwrap(), r);
        store.delete(&r.id).await.unwrap();
        store.delete(&r.id).await.unwrap();
        assert!(store.get(&r.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn expired_records_are_hidden_then_swept() {
        let store = MemoryStore::new(Duration::ZERO);
        let r = pick();
        store.put(&r).await.unwrap();
        store.record_delivery(&mapping(&r, 1, "p")).await.unwrap();
        assert!(store.get(&r.id).await.unwrap_err().is_not_found());
        let all: Vec<Record> = store.iterate().try_collect().await.unwrap();
        assert!(all.is_empty());
        assert_eq!(store.sweep_expired().await.unwrap(), vec![r.id.clone()]);
        assert!(store.resolve("p").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_cascades_to_mappings() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let r = pick();
        store.put(&r).await.unwrap();
        store.record_delivery(&mapping(&r, 1, "p1")).await.unwrap();
        store.delete(&r.id).await.unwrap();
        assert!(!store.has_delivered(&r.id, ChatId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_record_delivery_admits_exactly_one() {
        let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
        let r = pick();
        store.put(&r).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let m = mapping(&r, 9, &format!("poll-{i}"));
            handles.push(tokio::spawn(async move { store.record_delivery(&m).await }));
        }
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert!(e.is_already_recorded()),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn withdraw_all_returns_sorted_and_clears() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let r = pick();
        store.put(&r).await.unwrap();
        store.record_delivery(&mapping(&r, 2, "b")).await.unwrap();
        store.record_delivery(&mapping(&r, 1, "a")).await.unwrap();
        let taken = store.withdraw_all(&r.id).await.unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].chat_id, ChatId(1));
        assert!(store.withdraw_all(&r.id).await.unwrap().is_empty());
        assert!(store.resolve("a").await.is_err());
    }

    #[tokio::test]
    async fn sessions_are_a_set() {
        let store = MemoryStore::new(Duration::from_secs(60));
        assert!(store.admit(ChatId(3)).await.unwrap());
        assert!(!store.admit(ChatId(3)).await.unwrap());
        assert!(store.admit(ChatId(1)).await.unwrap());
        let members: Vec<ChatId> = store.members().await.unwrap().into_iter().collect();
        assert_eq!(members, vec![ChatId(1), ChatId(3)]);
        assert!(store.revoke(ChatId(3)).await.unwrap());
        assert!(!store.revoke(ChatId(3)).await.unwrap());
    }

    #[tokio::test]
    async fn closed_store_rejects_everything() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.close().await.unwrap();
        assert!(matches!(store.get(&RecordId::from("x")).await, Err(PollgateError::StoreClosed)));
        assert!(matches!(store.admit(ChatId(1)).await, Err(PollgateError::StoreClosed)));
        assert!(matches!(store.resolve("p").await, Err(PollgateError::StoreClosed)));
        let first = store.iterate().next().await.unwrap();
        assert!(matches!(first, Err(PollgateError::StoreClosed)));
    }
}
