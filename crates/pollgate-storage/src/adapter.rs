// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the record store, session registry and
//! correlation index.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tracing::debug;

use pollgate_config::model::StorageConfig;
use pollgate_core::{
    AdapterType, ChatId, CorrelationIndex, DeliveryMapping, HealthStatus, PluginAdapter,
    PollgateError, Record, RecordId, RecordStore, RecordStream, SessionRegistry,
};

use crate::database::{Database, map_tr_err, now_millis};
use crate::queries;

/// Rows fetched per round trip while iterating.
const ITERATE_PAGE_SIZE: usize = 128;

/// SQLite-backed storage.
///
/// One [`Database`] handle serves all three capabilities, so deleting or
/// sweeping a record also drops its delivery mappings through the foreign key.
pub struct SqliteStore {
    db: Database,
    record_ttl: Duration,
}

impl SqliteStore {
    /// Opens the database file named in the config and runs migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, PollgateError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store opened");
        Ok(Self::new(db, Duration::from_secs(config.record_ttl_secs)))
    }

    pub fn new(db: Database, record_ttl: Duration) -> Self {
        Self { db, record_ttl }
    }

    fn expires_at_ms(&self) -> i64 {
        let ttl_ms = i64::try_from(self.record_ttl.as_millis()).unwrap_or(i64::MAX);
        now_millis().saturating_add(ttl_ms)
    }
}

struct PageCursor {
    after: Option<String>,
    buffered: VecDeque<Record>,
    exhausted: bool,
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PollgateError> {
        self.db
            .connection()?
            .call(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put(&self, record: &Record) -> Result<(), PollgateError> {
        queries::records::upsert(&self.db, record, self.expires_at_ms()).await
    }

    async fn get(&self, id: &RecordId) -> Result<Record, PollgateError> {
        queries::records::get_live(&self.db, id, now_millis())
            .await?
            .ok_or_else(|| PollgateError::record_not_found(id.as_str()))
    }

    fn iterate(&self) -> RecordStream<'_> {
        let db = &self.db;
        let start = PageCursor {
            after: None,
            buffered: VecDeque::new(),
            exhausted: false,
        };
        stream::unfold(start, move |mut cursor| async move {
            loop {
                if let Some(record) = cursor.buffered.pop_front() {
                    return Some((Ok(record), cursor));
                }
                if cursor.exhausted {
                    return None;
                }
                let page = queries::records::page_after(
                    db,
                    cursor.after.clone(),
                    ITERATE_PAGE_SIZE,
                    now_millis(),
                )
                .await;
                match page {
                    Ok(page) => {
                        cursor.exhausted = page.len() < ITERATE_PAGE_SIZE;
                        if let Some(last) = page.last() {
                            cursor.after = Some(last.id.0.clone());
                        }
                        cursor.buffered.extend(page);
                    }
                    Err(e) => {
                        cursor.exhausted = true;
                        return Some((Err(e), cursor));
                    }
                }
            }
        })
        .boxed()
    }

    async fn delete(&self, id: &RecordId) -> Result<(), PollgateError> {
        queries::records::delete(&self.db, id).await
    }

    async fn sweep_expired(&self) -> Result<Vec<RecordId>, PollgateError> {
        let removed = queries::records::delete_expired(&self.db, now_millis()).await?;
        if !removed.is_empty() {
            debug!(removed = removed.len(), "swept expired records");
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<(), PollgateError> {
        self.db.close().await
    }
}

#[async_trait]
impl SessionRegistry for SqliteStore {
    async fn admit(&self, chat_id: ChatId) -> Result<bool, PollgateError> {
        queries::sessions::admit(&self.db, chat_id).await
    }

    async fn revoke(&self, chat_id: ChatId) -> Result<bool, PollgateError> {
        queries::sessions::revoke(&self.db, chat_id).await
    }

    async fn members(&self) -> Result<BTreeSet<ChatId>, PollgateError> {
        queries::sessions::members(&self.db).await
    }
}

#[async_trait]
impl CorrelationIndex for SqliteStore {
    async fn record_delivery(&self, mapping: &DeliveryMapping) -> Result<(), PollgateError> {
        if queries::deliveries::insert(&self.db, mapping).await? {
            Ok(())
        } else {
            Err(PollgateError::AlreadyRecorded {
                request_id: mapping.request_id.0.clone(),
                chat_id: mapping.chat_id.0,
            })
        }
    }

    async fn has_delivered(
        &self,
        request_id: &RecordId,
        chat_id: ChatId,
    ) -> Result<bool, PollgateError> {
        queries::deliveries::exists(&self.db, request_id, chat_id).await
    }

    async fn resolve(&self, poll_id: &str) -> Result<DeliveryMapping, PollgateError> {
        queries::deliveries::find_by_poll(&self.db, poll_id)
            .await?
            .ok_or_else(|| PollgateError::poll_not_found(poll_id))
    }

    async fn withdraw_all(
        &self,
        request_id: &RecordId,
    ) -> Result<Vec<DeliveryMapping>, PollgateError> {
        queries::deliveries::take_all(&self.db, request_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pollgate_core::Task;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        }
    }

    async fn memory_db_store(ttl: Duration) -> SqliteStore {
        SqliteStore::new(Database::open_in_memory().await.unwrap(), ttl)
    }

    fn pick() -> Record {
        Record::new(Task::new("Pick", vec!["A".into(), "B".into()]))
    }

    #[tokio::test]
    async fn sqlite_store_implements_plugin_adapter() {
        let store = memory_db_store(Duration::from_secs(60)).await;
        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn open_creates_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let store = SqliteStore::open(&make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();
        assert!(db_path.exists(), "database file should be created");
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let config = make_config(dir.path().join("durable.db").to_str().unwrap());
        let record = pick();
        {
            let store = SqliteStore::open(&config).await.unwrap();
            store.put(&record).await.unwrap();
            store.admit(ChatId(5)).await.unwrap();
            store.close().await.unwrap();
        }
        let store = SqliteStore::open(&config).await.unwrap();
        assert_eq!(store.get(&record.id).await.unwrap().id, record.id);
        assert!(store.members().await.unwrap().contains(&ChatId(5)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = memory_db_store(Duration::from_secs(60)).await;
        let err = store.get(&RecordId::from("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately_and_sweeps() {
        let store = memory_db_store(Duration::ZERO).await;
        let record = pick();
        store.put(&record).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(store.get(&record.id).await.unwrap_err().is_not_found());
        assert_eq!(store.sweep_expired().await.unwrap(), vec![record.id.clone()]);
        assert!(store.sweep_expired().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn iterate_spans_multiple_pages() {
        let store = memory_db_store(Duration::from_secs(60)).await;
        let total = ITERATE_PAGE_SIZE * 2 + 5;
        for _ in 0..total {
            store.put(&pick()).await.unwrap();
        }
        let all: Vec<Record> = store.iterate().try_collect().await.unwrap();
        assert_eq!(all.len(), total);
    }

    #[tokio::test]
    async fn iterate_survives_concurrent_deletes() {
        let store = memory_db_store(Duration::from_secs(60)).await;
        let mut ids = Vec::new();
        for _ in 0..(ITERATE_PAGE_SIZE + 10) {
            let r = pick();
            ids.push(r.id.clone());
            store.put(&r).await.unwrap();
        }
        let mut stream = store.iterate();
        let first = stream.next().await.unwrap().unwrap();
        for id in &ids {
            if *id != first.id {
                store.delete(id).await.unwrap();
            }
        }
        let rest: Vec<Record> = stream.try_collect().await.unwrap();
        assert!(rest.len() < ids.len());
    }

    #[tokio::test]
    async fn record_delivery_twice_is_already_recorded() {
        let store = memory_db_store(Duration::from_secs(60)).await;
        let record = pick();
        store.put(&record).await.unwrap();
        let mapping = DeliveryMapping {
            request_id: record.id.clone(),
            chat_id: ChatId(1),
            poll_id: "poll-1".into(),
            message_id: 3,
            delivered_at: chrono::Utc::now(),
        };
        store.record_delivery(&mapping).await.unwrap();
        let err = store
            .record_delivery(&DeliveryMapping {
                poll_id: "poll-2".into(),
                ..mapping.clone()
            })
            .await
            .unwrap_err();
        assert!(err.is_already_recorded());
        assert_eq!(store.resolve("poll-1").await.unwrap(), mapping);
        assert!(store.resolve("poll-2").await.unwrap_err().is_not_found());
        assert!(store.has_delivered(&record.id, ChatId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn operations_fail_after_close() {
        let store = memory_db_store(Duration::from_secs(60)).await;
        store.close().await.unwrap();
        assert!(matches!(
            store.put(&pick()).await,
            Err(PollgateError::StoreClosed)
        ));
        assert!(matches!(
            store.members().await,
            Err(PollgateError::StoreClosed)
        ));
        let first = store.iterate().next().await.unwrap();
        assert!(matches!(first, Err(PollgateError::StoreClosed)));
    }
}
