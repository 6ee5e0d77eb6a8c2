// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record CRUD, keyset paging and expiry sweeps.

use pollgate_core::{PollgateError, Record, RecordId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{RECORD_COLUMNS, encode_task, encode_time, record_from_row};

/// Inserts or overwrites a record, moving its expiry to `expires_at_ms`.
///
/// Uses an upsert rather than `INSERT OR REPLACE`: a replace deletes the old
/// row first, which would cascade to its deliveries.
pub async fn upsert(db: &Database, record: &Record, expires_at_ms: i64) -> Result<(), PollgateError> {
    let record = record.clone();
    db.connection()?
        .call(move |conn| {
            let task = encode_task(&record.task)?;
            conn.execute(
                "INSERT INTO records
                     (id, task, status, selected_option, resolved_text, created_at, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     task = excluded.task,
                     status = excluded.status,
                     selected_option = excluded.selected_option,
                     resolved_text = excluded.resolved_text,
                     updated_at = excluded.updated_at,
                     expires_at = excluded.expires_at",
                params![
                    record.id.as_str(),
                    task,
                    record.status.to_string(),
                    record.selected_option.map(|o| o as i64),
                    record.resolved_text,
                    encode_time(&record.created_at),
                    encode_time(&record.updated_at),
                    expires_at_ms,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetches a record that has not expired as of `now_ms`.
pub async fn get_live(
    db: &Database,
    id: &RecordId,
    now_ms: i64,
) -> Result<Option<Record>, PollgateError> {
    let id = id.as_str().to_string();
    db.connection()?
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1 AND expires_at > ?2"
            ))?;
            stmt.query_row(params![id, now_ms], record_from_row).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// One page of live records with ids strictly greater than `after`, in id order.
pub async fn page_after(
    db: &Database,
    after: Option<String>,
    limit: usize,
    now_ms: i64,
) -> Result<Vec<Record>, PollgateError> {
    let after = after.unwrap_or_default();
    let limit = limit as i64;
    db.connection()?
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE id > ?1 AND expires_at > ?2
                 ORDER BY id ASC
                 LIMIT ?3"
            ))?;
            let records = stmt
                .query_map(params![after, now_ms, limit], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes a record; its deliveries go with it through the foreign key.
pub async fn delete(db: &Database, id: &RecordId) -> Result<(), PollgateError> {
    let id = id.as_str().to_string();
    db.connection()?
        .call(move |conn| {
            conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes every record whose expiry is at or before `now_ms`. Returns their ids.
pub async fn delete_expired(db: &Database, now_ms: i64) -> Result<Vec<RecordId>, PollgateError> {
    db.connection()?
        .call(move |conn| {
            let mut stmt = conn.prepare("DELETE FROM records WHERE expires_at <= ?1 RETURNING id")?;
            let ids = stmt
                .query_map(params![now_ms], |row| row.get::<_, String>(0))?
                .map(|id| id.map(RecordId))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}
