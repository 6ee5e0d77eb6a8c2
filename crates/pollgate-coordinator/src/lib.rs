// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery coordinator for Pollgate.
//!
//! The [`Coordinator`] runs three tasks that share the storage handles:
//! - the send loop, which fans one queued record per tick out to every
//!   subscribed chat;
//! - the answer loop, which resolves records from poll answers and handles
//!   admission requests, one event at a time in arrival order;
//! - the retention sweep, which drops expired records and queues records
//!   written by other processes.

pub mod admission;
pub mod answer;
pub mod send;
pub mod shutdown;
pub mod sweep;

use std::sync::Arc;
use std::time::Duration;

use pollgate_cache::RecordService;
use pollgate_config::PollgateConfig;
use pollgate_core::{CorrelationIndex, PollTransport, PollgateError, SessionRegistry};
use pollgate_storage::Backend;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use admission::{ACCESS_GRANTED, is_authorized};
pub use answer::AnswerOutcome;
pub use send::TickOutcome;
pub use shutdown::install_signal_handler;

/// Shared handles and settings for the delivery loops. Cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    transport: Arc<dyn PollTransport>,
    sessions: Arc<dyn SessionRegistry>,
    index: Arc<dyn CorrelationIndex>,
    service: RecordService,
    allowed_users: Arc<[String]>,
    send_interval: Duration,
    sweep_interval: Duration,
    /// Held across every read-modify-write of a record's status.
    write_gate: Arc<Mutex<()>>,
}

impl Coordinator {
    pub fn new(
        transport: Arc<dyn PollTransport>,
        backend: &Backend,
        service: RecordService,
        config: &PollgateConfig,
    ) -> Self {
        Self {
            transport,
            sessions: backend.sessions.clone(),
            index: backend.index.clone(),
            service,
            allowed_users: config.telegram.allowed_users.clone().into(),
            send_interval: Duration::from_millis(config.delivery.send_interval_ms),
            sweep_interval: Duration::from_secs(config.delivery.sweep_interval_secs),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Runs the send loop, answer loop and sweep until `cancel` fires, then
    /// waits for all three to finish their current unit of work.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), PollgateError> {
        info!(
            send_interval_ms = self.send_interval.as_millis() as u64,
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "coordinator running"
        );

        let send = tokio::spawn({
            let this = self.clone();
            let cancel = cancel.clone();
            async move { this.run_send_loop(cancel).await }
        });
        let answers = tokio::spawn({
            let this = self.clone();
            let cancel = cancel.clone();
            async move { this.run_answer_loop(cancel).await }
        });
        let sweep = tokio::spawn({
            let this = self.clone();
            let cancel = cancel.clone();
            async move { this.run_sweep_loop(cancel).await }
        });

        let (send, answers, sweep) = tokio::join!(send, answers, sweep);
        for (task, result) in [("send", send), ("answer", answers), ("sweep", sweep)] {
            if let Err(e) = result {
                error!(task, error = %e, "coordinator task aborted");
            }
        }

        info!("coordinator stopped");
        Ok(())
    }
}
