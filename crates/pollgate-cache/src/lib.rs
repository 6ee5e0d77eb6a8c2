// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local record cache for Pollgate and the [`RecordService`] that keeps it
//! consistent with the record store.

pub mod cache;
pub mod service;

pub use cache::{CacheMiss, RecordCache};
pub use service::RecordService;
