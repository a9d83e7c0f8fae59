// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the shared store contract against a file-backed SQLite store.

use tempfile::TempDir;
use tidyhq_config::model::StorageConfig;
use tidyhq_storage::SqliteStore;

async fn open_store() -> (SqliteStore, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = StorageConfig {
        database_path: dir.path().join("tidyhq.db").display().to_string(),
        wal_mode: true,
    };
    let store = SqliteStore::open(config).await.expect("open store");
    (store, dir)
}

tidyhq_test_utils::store_contract_tests!(open_store());

mod persistence {
    use super::*;
    use tidyhq_core::{JobQueue, PluginAdapter, StorageAdapter};
    use tidyhq_test_utils::fixtures::{email_job, t0};

    #[tokio::test]
    async fn jobs_survive_reopen() {
        let (store, dir) = open_store().await;
        let id = store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
        store.close().await.unwrap();
        drop(store);

        let config = StorageConfig {
            database_path: dir.path().join("tidyhq.db").display().to_string(),
            wal_mode: true,
        };
        let reopened = SqliteStore::open(config).await.unwrap();
        let job = reopened.get_job(id).await.unwrap().expect("job persisted");
        assert_eq!(job.payload.recipient, "dana@example.com");
        assert_eq!(reopened.name(), "sqlite");
    }
}
