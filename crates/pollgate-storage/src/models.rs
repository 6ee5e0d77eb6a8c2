// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row encoding for the storage tables.
//!
//! The canonical types live in `pollgate-core`; this module converts them to
//! and from SQLite columns.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

pub use pollgate_core::types::{ChatId, DeliveryMapping, Record, RecordId, RecordStatus, Task};

/// Column list shared by every `records` query, in [`record_from_row`] order.
pub(crate) const RECORD_COLUMNS: &str =
    "id, task, status, selected_option, resolved_text, created_at, updated_at";

/// Column list shared by every `deliveries` query, in [`mapping_from_row`] order.
pub(crate) const DELIVERY_COLUMNS: &str =
    "request_id, chat_id, poll_id, message_id, delivered_at";

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn encode_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn encode_task(task: &Task) -> rusqlite::Result<String> {
    serde_json::to_string(task).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let id: String = row.get(0)?;
    let task_json: String = row.get(1)?;
    let task: Task = serde_json::from_str(&task_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let status_raw: String = row.get(2)?;
    let status = RecordStatus::from_str(&status_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let selected_option: Option<i64> = row.get(3)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(Record {
        id: RecordId(id),
        task,
        status,
        selected_option: selected_option.map(|o| o as usize),
        resolved_text: row.get(4)?,
        created_at: decode_time(5, &created_at)?,
        updated_at: decode_time(6, &updated_at)?,
    })
}

pub(crate) fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<DeliveryMapping> {
    let delivered_at: String = row.get(4)?;
    Ok(DeliveryMapping {
        request_id: RecordId(row.get(0)?),
        chat_id: ChatId(row.get(1)?),
        poll_id: row.get(2)?,
        message_id: row.get(3)?,
        delivered_at: decode_time(4, &delivered_at)?,
    })
}
