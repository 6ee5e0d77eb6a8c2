// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend selection.

use std::sync::Arc;
use std::time::Duration;

use pollgate_config::model::{StorageBackend, StorageConfig};
use pollgate_core::{CorrelationIndex, PollgateError, RecordStore, SessionRegistry};
use tracing::info;

use crate::adapter::SqliteStore;
use crate::memory::MemoryStore;

/// The three storage capabilities, all served by one underlying backend.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn RecordStore>,
    pub sessions: Arc<dyn SessionRegistry>,
    pub index: Arc<dyn CorrelationIndex>,
}

impl Backend {
    /// Exposes one object as all three capabilities.
    pub fn from_shared<T>(inner: Arc<T>) -> Self
    where
        T: RecordStore + SessionRegistry + CorrelationIndex,
    {
        Self {
            store: inner.clone(),
            sessions: inner.clone(),
            index: inner,
        }
    }

    /// A fresh in-memory backend.
    pub fn memory(record_ttl: Duration) -> Self {
        Self::from_shared(Arc::new(MemoryStore::new(record_ttl)))
    }
}

/// Opens the backend named by `storage.backend`. Called once at startup.
pub async fn open_backend(config: &StorageConfig) -> Result<Backend, PollgateError> {
    let backend = match config.backend {
        StorageBackend::Sqlite => Backend::from_shared(Arc::new(SqliteStore::open(config).await?)),
        StorageBackend::Memory => Backend::memory(Duration::from_secs(config.record_ttl_secs)),
    };
    info!(backend = backend.store.name(), "storage backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollgate_core::{ChatId, Record, Task};

    #[tokio::test]
    async fn memory_backend_shares_state_across_handles() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let backend = open_backend(&config).await.unwrap();
        assert_eq!(backend.store.name(), "memory");

        let r = Record::new(Task::new("Pick", vec!["A".into(), "B".into()]));
        backend.store.put(&r).await.unwrap();
        backend.sessions.admit(ChatId(1)).await.unwrap();
        backend
            .index
            .record_delivery(&pollgate_core::DeliveryMapping {
                request_id: r.id.clone(),
                chat_id: ChatId(1),
                poll_id: "p".into(),
                message_id: 1,
                delivered_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        backend.store.delete(&r.id).await.unwrap();
        assert!(backend.index.resolve("p").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn sqlite_backend_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            database_path: dir.path().join("b.db").display().to_string(),
            ..StorageConfig::default()
        };
        let backend = open_backend(&config).await.unwrap();
        assert_eq!(backend.store.name(), "sqlite");
        backend.store.close().await.unwrap();
    }
}
