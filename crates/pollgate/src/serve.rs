// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pollgate serve` command implementation.
//!
//! Opens the storage backend, rebuilds the request queue, connects the
//! Telegram transport, starts the HTTP gateway, and runs the delivery
//! coordinator until SIGINT or SIGTERM.

use std::sync::Arc;

use pollgate_cache::{RecordCache, RecordService};
use pollgate_config::PollgateConfig;
use pollgate_coordinator::{Coordinator, shutdown};
use pollgate_core::{PollTransport, PollgateError};
use pollgate_gateway::{GatewayState, start_server};
use pollgate_storage::{RequestQueue, open_backend};
use pollgate_telegram::TelegramTransport;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the `pollgate serve` command.
///
/// Shutdown order: signal, transport stops dispatching, gateway drains,
/// delivery loops finish their current unit of work, store is closed.
pub async fn run_serve(config: PollgateConfig) -> Result<(), PollgateError> {
    init_tracing(&config.service.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting pollgate serve");

    let backend = open_backend(&config.storage).await?;

    let queue = Arc::new(RequestQueue::new());
    let restored = queue.load_pending(backend.store.as_ref()).await?;
    info!(restored, "request queue rebuilt from store");

    let cache = RecordCache::from_config(&config.delivery);
    let service = RecordService::new(backend.store.clone(), cache, queue);

    let mut transport = TelegramTransport::new(&config.telegram)?;
    transport.connect().await?;
    let transport: Arc<dyn PollTransport> = Arc::new(transport);

    let shutdown = shutdown::install_signal_handler();

    let gateway_config = config.gateway.clone();
    let gateway_state = GatewayState::new(service.clone(), config.gateway.api_key.clone());
    let gateway_token = shutdown.child_token();
    let mut gateway = tokio::spawn(async move {
        start_server(&gateway_config, gateway_state, gateway_token).await
    });

    let loops = CancellationToken::new();
    let coordinator = Coordinator::new(transport.clone(), &backend, service, &config);
    let delivery = tokio::spawn({
        let loops = loops.clone();
        async move { coordinator.run(loops).await }
    });

    let mut failure = None;
    let mut gateway_done = false;
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = &mut gateway => {
            gateway_done = true;
            match result {
                Ok(Ok(())) => warn!("gateway exited before shutdown"),
                Ok(Err(e)) => {
                    error!(error = %e, "gateway failed");
                    failure = Some(e);
                }
                Err(e) => {
                    error!(error = %e, "gateway task aborted");
                    failure = Some(PollgateError::Internal(format!("gateway task aborted: {e}")));
                }
            }
            shutdown.cancel();
        }
    }

    info!("shutting down");
    if let Err(e) = transport.disconnect().await {
        warn!(error = %e, "transport disconnect failed");
    }

    if !gateway_done {
        match gateway.await {
            Ok(Err(e)) => error!(error = %e, "gateway failed during shutdown"),
            Err(e) => error!(error = %e, "gateway task aborted"),
            Ok(Ok(())) => {}
        }
    }

    loops.cancel();
    match delivery.await {
        Ok(Err(e)) => error!(error = %e, "coordinator failed"),
        Err(e) => error!(error = %e, "coordinator task aborted"),
        Ok(Ok(())) => {}
    }

    backend.store.close().await?;
    info!("pollgate serve shutdown complete");

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pollgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
