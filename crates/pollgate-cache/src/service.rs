// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single read/write path for records.
//!
//! Writes go to the store first and then refresh the cache; a failed store
//! write drops the cache entry so no reader sees a value the store lacks.
//! Reads try the cache, fall back to the store, and fill the cache unless a
//! newer copy landed there in the meantime.

use std::sync::Arc;

use pollgate_core::{PollgateError, Record, RecordId, RecordStore, Task};
use pollgate_storage::RequestQueue;
use tracing::{debug, warn};

use crate::cache::RecordCache;

#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    cache: RecordCache,
    queue: Arc<RequestQueue>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>, cache: RecordCache, queue: Arc<RequestQueue>) -> Self {
        Self {
            store,
            cache,
            queue,
        }
    }

    /// Validates the task, stores a new pending record and queues it for delivery.
    pub async fn create(&self, task: Task) -> Result<Record, PollgateError> {
        task.validate()?;
        let record = Record::new(task);
        self.save(&record).await?;
        self.queue.push(record.id.clone());
        debug!(request_id = %record.id, "record created");
        Ok(record)
    }

    /// Reads a record through the cache.
    pub async fn get(&self, id: &RecordId) -> Result<Record, PollgateError> {
        if let Ok(record) = self.cache.get(id).await {
            return Ok(record);
        }
        let record = self.store.get(id).await?;
        if !self.cache.fill(&record).await {
            debug!(request_id = %id, "cache already holds a newer copy");
        }
        Ok(record)
    }

    /// Persists a record, then mirrors it into the cache.
    pub async fn save(&self, record: &Record) -> Result<(), PollgateError> {
        match self.store.put(record).await {
            Ok(()) => {
                self.cache.put(record).await;
                Ok(())
            }
            Err(e) => {
                warn!(request_id = %record.id, error = %e, "store write failed, dropping cached copy");
                self.cache.invalidate(&record.id).await;
                Err(e)
            }
        }
    }

    /// Drops the cached copy of a record.
    pub async fn invalidate(&self, id: &RecordId) {
        self.cache.invalidate(id).await;
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}
