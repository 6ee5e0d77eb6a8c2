// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session membership operations.

use std::collections::BTreeSet;

use pollgate_core::{ChatId, PollgateError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Adds a chat. Returns `true` if it was not already subscribed.
pub async fn admit(db: &Database, chat_id: ChatId) -> Result<bool, PollgateError> {
    db.connection()?
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO sessions (chat_id) VALUES (?1) ON CONFLICT(chat_id) DO NOTHING",
                params![chat_id.0],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Removes a chat. Returns `true` if it was subscribed.
pub async fn revoke(db: &Database, chat_id: ChatId) -> Result<bool, PollgateError> {
    db.connection()?
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE chat_id = ?1", params![chat_id.0])?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// All subscribed chats.
pub async fn members(db: &Database) -> Result<BTreeSet<ChatId>, PollgateError> {
    db.connection()?
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT chat_id FROM sessions")?;
            let members = stmt
                .query_map([], |row| row.get::<_, i64>(0).map(ChatId))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            Ok(members)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admit_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(admit(&db, ChatId(7)).await.unwrap());
        assert!(!admit(&db, ChatId(7)).await.unwrap());
        assert_eq!(members(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn revoke_reports_membership() {
        let db = Database::open_in_memory().await.unwrap();
        admit(&db, ChatId(1)).await.unwrap();
        assert!(revoke(&db, ChatId(1)).await.unwrap());
        assert!(!revoke(&db, ChatId(1)).await.unwrap());
        assert!(members(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn members_are_sorted() {
        let db = Database::open_in_memory().await.unwrap();
        for id in [30, -5, 12] {
            admit(&db, ChatId(id)).await.unwrap();
        }
        let got: Vec<i64> = members(&db).await.unwrap().into_iter().map(|c| c.0).collect();
        assert_eq!(got, vec![-5, 12, 30]);
    }
}
