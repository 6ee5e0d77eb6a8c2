// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Pollgate.
//!
//! Exposes the REST API that creates poll requests and reports their
//! resolution. All writes and reads go through [`pollgate_cache::RecordService`],
//! so the gateway sees the same cached view as the delivery coordinator.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, router, start_server};
