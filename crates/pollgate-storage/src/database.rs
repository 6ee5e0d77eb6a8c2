// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so the
//! [`Database`] handle is the only writer. Do NOT open additional
//! connections for writes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use pollgate_core::PollgateError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite database file.
pub struct Database {
    conn: Connection,
    closed: AtomicBool,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs and
    /// runs pending migrations.
    pub async fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, PollgateError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .await
            .map_err(PollgateError::store)?;
        Self::init(&conn, wal_mode).await?;
        debug!(path = %path.display(), wal_mode, "database opened");
        Ok(Self {
            conn,
            closed: AtomicBool::new(false),
        })
    }

    /// Opens a private in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self, PollgateError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(PollgateError::store)?;
        Self::init(&conn, false).await?;
        Ok(Self {
            conn,
            closed: AtomicBool::new(false),
        })
    }

    async fn init(conn: &Connection, wal_mode: bool) -> Result<(), PollgateError> {
        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| {
            migrations::run_migrations(conn)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        })
        .await
        .map_err(map_tr_err)
    }

    /// The connection every query runs through.
    ///
    /// Fails with [`PollgateError::StoreClosed`] after [`close`](Self::close).
    pub fn connection(&self) -> Result<&Connection, PollgateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PollgateError::StoreClosed);
        }
        Ok(&self.conn)
    }

    /// Checkpoints the WAL and refuses every later call. Idempotent.
    pub async fn close(&self) -> Result<(), PollgateError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.conn
            .call(|conn| {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete, database closed");
        Ok(())
    }
}

/// Maps a tokio-rusqlite failure onto the store error variants.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> PollgateError {
    match e {
        tokio_rusqlite::Error::ConnectionClosed => PollgateError::StoreClosed,
        other => PollgateError::store(other),
    }
}

/// Current wall clock in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
