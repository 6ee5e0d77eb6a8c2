// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic retention sweep.

use pollgate_core::PollgateError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::Coordinator;

impl Coordinator {
    pub(crate) async fn run_sweep_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; startup already loaded the queue.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => {
                    debug!("sweep loop stopping");
                    break;
                }
            }
            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "retention sweep failed");
            }
        }
    }

    /// Deletes expired records, then queues unresolved records the queue does
    /// not know about yet (for example ones written by `pollgate submit`).
    ///
    /// Returns `(expired, queued)`.
    pub async fn sweep_once(&self) -> Result<(usize, usize), PollgateError> {
        let store = self.service.store();
        let swept = store.sweep_expired().await?;
        for id in &swept {
            self.service.invalidate(id).await;
            self.service.queue().complete(id);
        }
        let expired = swept.len();
        let queued = self.service.queue().load_pending(store.as_ref()).await?;
        if expired > 0 || queued > 0 {
            info!(expired, queued, "retention sweep finished");
        }
        Ok((expired, queued))
    }
}
