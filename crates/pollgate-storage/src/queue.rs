// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FIFO rotation of pending record ids.
//!
//! The send loop takes one id per tick with [`RequestQueue::checkout`] and
//! hands it back with [`RequestQueue::release`], which puts it at the tail.
//! Every pending record therefore gets a turn before any record gets a second
//! one. Ids that reach `Done` or vanish are dropped with
//! [`RequestQueue::complete`], even while checked out.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::TryStreamExt;
use pollgate_core::{PollgateError, Record, RecordId, RecordStore};
use tracing::debug;

#[derive(Default)]
struct QueueState {
    order: VecDeque<RecordId>,
    queued: HashSet<RecordId>,
    in_flight: HashSet<RecordId>,
}

/// Round-robin queue of record ids awaiting delivery or an answer.
#[derive(Default)]
pub struct RequestQueue {
    state: Mutex<QueueState>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an id. Returns `false` if it is already queued or checked out.
    pub fn push(&self, id: RecordId) -> bool {
        let mut state = self.lock();
        if state.queued.contains(&id) || state.in_flight.contains(&id) {
            return false;
        }
        state.queued.insert(id.clone());
        state.order.push_back(id);
        true
    }

    /// Takes the head of the queue and marks it in flight.
    pub fn checkout(&self) -> Option<RecordId> {
        let mut state = self.lock();
        let id = state.order.pop_front()?;
        state.queued.remove(&id);
        state.in_flight.insert(id.clone());
        Some(id)
    }

    /// Returns a checked-out id to the tail, unless it was completed meanwhile.
    pub fn release(&self, id: &RecordId) -> bool {
        let mut state = self.lock();
        if !state.in_flight.remove(id) {
            return false;
        }
        state.queued.insert(id.clone());
        state.order.push_back(id.clone());
        true
    }

    /// Forgets an id wherever it is.
    pub fn complete(&self, id: &RecordId) {
        let mut state = self.lock();
        state.in_flight.remove(id);
        if state.queued.remove(id) {
            state.order.retain(|queued| queued != id);
        }
    }

    /// Number of ids waiting, excluding those checked out.
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the id is queued or checked out.
    pub fn contains(&self, id: &RecordId) -> bool {
        let state = self.lock();
        state.queued.contains(id) || state.in_flight.contains(id)
    }

    /// Pushes every live, unresolved record of the store, oldest first.
    ///
    /// Ids already known to the queue are skipped, so this is used both to
    /// rebuild the queue at startup and to pick up records written by other
    /// processes. Returns how many ids were added.
    pub async fn load_pending(&self, store: &dyn RecordStore) -> Result<usize, PollgateError> {
        let mut pending: Vec<Record> = store
            .iterate()
            .try_filter(|record| futures::future::ready(!record.is_done()))
            .try_collect()
            .await?;
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let added = pending
            .into_iter()
            .filter(|record| self.push(record.id.clone()))
            .count();
        if added > 0 {
            debug!(added, "queued pending records from store");
        }
        Ok(added)
    }
}
