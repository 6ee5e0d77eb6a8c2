// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Every backend and transport extends the [`PluginAdapter`] base trait and
//! uses `#[async_trait]` so it can be held as `Arc<dyn Trait>`.

pub mod adapter;
pub mod correlation;
pub mod session;
pub mod store;
pub mod transport;

pub use adapter::PluginAdapter;
pub use correlation::CorrelationIndex;
pub use session::SessionRegistry;
pub use store::{RecordStore, RecordStream};
pub use transport::PollTransport;
