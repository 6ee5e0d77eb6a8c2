// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pollgate submit` command implementation.
//!
//! Writes a pending record straight into the configured store. A running
//! `pollgate serve` against the same database picks it up on its next sweep.

use pollgate_config::PollgateConfig;
use pollgate_core::{PollgateError, Record, RecordId, Task};
use pollgate_storage::open_backend;

pub async fn run_submit(
    config: &PollgateConfig,
    message: String,
    buttons: Vec<String>,
) -> Result<RecordId, PollgateError> {
    let task = Task::new(message, buttons);
    task.validate()?;

    let backend = open_backend(&config.storage).await?;
    let record = Record::new(task);
    let result = backend.store.put(&record).await;
    backend.store.close().await?;
    result?;
    Ok(record.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollgate_config::StorageBackend;

    #[tokio::test]
    async fn submit_persists_record_for_later_serve() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PollgateConfig::default();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.database_path = dir.path().join("p.db").to_string_lossy().to_string();

        let id = run_submit(&config, "Pick".into(), vec!["A".into(), "B".into()])
            .await
            .unwrap();

        let backend = open_backend(&config.storage).await.unwrap();
        let record = backend.store.get(&id).await.unwrap();
        assert_eq!(record.task.buttons, vec!["A", "B"]);
        assert!(!record.is_done());
        backend.store.close().await.unwrap();
    }

    #[tokio::test]
    async fn submit_rejects_invalid_task() {
        let config = PollgateConfig::default();
        let err = run_submit(&config, "Pick".into(), vec!["A".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, PollgateError::Validation(_)));
    }
}
