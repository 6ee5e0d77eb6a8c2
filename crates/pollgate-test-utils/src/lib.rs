// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pollgate integration tests.
//!
//! Provides a mock chat transport and a harness that wires storage, cache and
//! queue together, for fast deterministic tests without a bot token.
//!
//! # Components
//!
//! - [`MockTransport`] - captures polls, messages and stop calls; injectable events
//! - [`FaultyStore`] - memory backend with injectable write failures
//! - [`TestHarness`] - backend, record service and mock transport in one place

pub mod faulty_store;
pub mod harness;
pub mod mock_transport;

pub use faulty_store::FaultyStore;
pub use harness::TestHarness;
pub use mock_transport::{MockTransport, SentPollCall};
