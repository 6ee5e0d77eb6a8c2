// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a storage backend (in-memory by default, or a temp
//! SQLite database), the record cache and service, the request queue, and a
//! [`MockTransport`]. The delivery coordinator is built on top of these by the
//! tests themselves.

use std::sync::Arc;
use std::time::Duration;

use pollgate_cache::{RecordCache, RecordService};
use pollgate_config::{PollgateConfig, StorageBackend};
use pollgate_core::{ChatId, PollgateError, Record, RecordId, Task};
use pollgate_storage::{Backend, RequestQueue, open_backend};

use crate::faulty_store::FaultyStore;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    sqlite: bool,
    faults: bool,
    allowed_users: Vec<String>,
    members: Vec<ChatId>,
    record_ttl: Duration,
    cache_ttl: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            sqlite: false,
            faults: false,
            allowed_users: Vec::new(),
            members: Vec::new(),
            record_ttl: Duration::from_secs(3600),
            cache_ttl: Duration::from_secs(600),
        }
    }

    /// Use a SQLite database in a temp directory instead of the memory backend.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Use a memory backend whose writes can be made to fail.
    pub fn with_faults(mut self) -> Self {
        self.faults = true;
        self
    }

    /// Set the admission allow-list.
    pub fn with_allowed_users(mut self, users: &[&str]) -> Self {
        self.allowed_users = users.iter().map(|u| u.to_string()).collect();
        self
    }

    /// Pre-admit these chats into the session registry.
    pub fn with_members(mut self, chats: &[i64]) -> Self {
        self.members = chats.iter().copied().map(ChatId).collect();
        self
    }

    /// Override the record retention period.
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = ttl;
        self
    }

    /// Override the cache time-to-live.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, PollgateError> {
        let temp_dir = tempfile::TempDir::new().map_err(PollgateError::store)?;

        let mut config = PollgateConfig::default();
        config.telegram.allowed_users = self.allowed_users;
        config.gateway.api_key = Some("test-key".to_string());
        config.storage.record_ttl_secs = self.record_ttl.as_secs();
        config.delivery.send_interval_ms = 50;
        config.delivery.cache_ttl_secs = self.cache_ttl.as_secs().max(1);
        if self.sqlite {
            config.storage.backend = StorageBackend::Sqlite;
            config.storage.database_path =
                temp_dir.path().join("test.db").to_string_lossy().to_string();
        } else {
            config.storage.backend = StorageBackend::Memory;
        }

        // Sub-second TTLs only matter for expiry tests, which use the memory backend.
        let mut faults = None;
        let backend = if self.sqlite {
            open_backend(&config.storage).await?
        } else if self.faults {
            let store = Arc::new(FaultyStore::new(self.record_ttl));
            faults = Some(store.clone());
            Backend::from_shared(store)
        } else {
            Backend::memory(self.record_ttl)
        };

        for chat in &self.members {
            backend.sessions.admit(*chat).await?;
        }

        let cache = RecordCache::new(config.delivery.cache_capacity, self.cache_ttl);
        let queue = Arc::new(RequestQueue::new());
        let service = RecordService::new(backend.store.clone(), cache, queue);

        Ok(TestHarness {
            transport: Arc::new(MockTransport::new()),
            backend,
            faults,
            service,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock transport and temp storage.
pub struct TestHarness {
    /// The mock chat transport.
    pub transport: Arc<MockTransport>,
    /// Record store, session registry and correlation index.
    pub backend: Backend,
    /// Failure switches, present when built `with_faults`.
    pub faults: Option<Arc<FaultyStore>>,
    /// Cached read/write path, with the request queue.
    pub service: RecordService,
    /// Configuration matching the assembled pieces.
    pub config: PollgateConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Memory backend, no members, empty allow-list.
    pub async fn new() -> Result<Self, PollgateError> {
        Self::builder().build().await
    }

    /// Creates and queues a record, as `POST /v1/` would.
    pub async fn submit(&self, message: &str, buttons: &[&str]) -> Result<Record, PollgateError> {
        let buttons = buttons.iter().map(|b| b.to_string()).collect();
        self.service.create(Task::new(message, buttons)).await
    }

    /// Reads a record through the cache.
    pub async fn record(&self, id: &RecordId) -> Result<Record, PollgateError> {
        self.service.get(id).await
    }

    /// Adds a chat to the session registry.
    pub async fn admit(&self, chat_id: i64) -> Result<bool, PollgateError> {
        self.backend.sessions.admit(ChatId(chat_id)).await
    }

    /// Failure switches of a harness built `with_faults`.
    ///
    /// # Panics
    ///
    /// Panics if the harness was built without faults.
    pub fn faults(&self) -> &FaultyStore {
        self.faults
            .as_deref()
            .expect("harness built without with_faults()")
    }

    /// Current session members.
    pub async fn members(&self) -> Result<Vec<ChatId>, PollgateError> {
        Ok(self.backend.sessions.members().await?.into_iter().collect())
    }
}
