// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backends for Pollgate.
//!
//! Provides a WAL-mode SQLite backend with embedded migrations and a
//! single-writer connection via `tokio-rusqlite`, an in-memory backend for
//! development and tests, and the [`RequestQueue`] that orders pending
//! records for delivery. [`open_backend`] picks one backend at startup.

pub mod adapter;
pub mod backend;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod queue;

pub use adapter::SqliteStore;
pub use backend::{Backend, open_backend};
pub use database::Database;
pub use memory::MemoryStore;
pub use queue::RequestQueue;
