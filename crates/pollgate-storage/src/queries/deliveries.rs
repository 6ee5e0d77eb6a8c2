// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery mapping operations backing the correlation index.

use pollgate_core::{ChatId, DeliveryMapping, PollgateError, RecordId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{DELIVERY_COLUMNS, encode_time, mapping_from_row};

/// Inserts a mapping. Returns `false` if the (request, chat) pair already had one.
pub async fn insert(db: &Database, mapping: &DeliveryMapping) -> Result<bool, PollgateError> {
    let mapping = mapping.clone();
    db.connection()?
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO deliveries (request_id, chat_id, poll_id, message_id, delivered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(request_id, chat_id) DO NOTHING",
                params![
                    mapping.request_id.as_str(),
                    mapping.chat_id.0,
                    mapping.poll_id,
                    mapping.message_id,
                    encode_time(&mapping.delivered_at),
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn exists(
    db: &Database,
    request_id: &RecordId,
    chat_id: ChatId,
) -> Result<bool, PollgateError> {
    let request_id = request_id.as_str().to_string();
    db.connection()?
        .call(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM deliveries WHERE request_id = ?1 AND chat_id = ?2",
                    params![request_id, chat_id.0],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_poll(
    db: &Database,
    poll_id: &str,
) -> Result<Option<DeliveryMapping>, PollgateError> {
    let poll_id = poll_id.to_string();
    db.connection()?
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE poll_id = ?1"
            ))?;
            stmt.query_row(params![poll_id], mapping_from_row).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes and returns every mapping of a request in one transaction.
pub async fn take_all(
    db: &Database,
    request_id: &RecordId,
) -> Result<Vec<DeliveryMapping>, PollgateError> {
    let request_id = request_id.as_str().to_string();
    db.connection()?
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mappings = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE request_id = ?1 ORDER BY chat_id"
                ))?;
                stmt.query_map(params![request_id], mapping_from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            };
            tx.execute(
                "DELETE FROM deliveries WHERE request_id = ?1",
                params![request_id],
            )?;
            tx.commit()?;
            Ok(mappings)
        })
        .await
        .map_err(map_tr_err)
}
