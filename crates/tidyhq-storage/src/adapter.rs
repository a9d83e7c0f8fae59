// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage, booking store, and job queue traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use tidyhq_config::model::StorageConfig;
use tidyhq_core::{
    AdapterType, Assignment, Booking, BookingFilter, BookingId, BookingStore, ChangeSet,
    CommitReceipt, HealthStatus, JobFilter, JobId, JobQueue, JobStats, JobStatus, NewJob,
    NotificationJob, PluginAdapter, RetryPolicy, ScheduledAssignment, Staff, StaffId,
    StatusRecord, StorageAdapter, TidyError,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new store with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Creates and initializes a store in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, TidyError> {
        let store = Self::new(config);
        store.initialize().await?;
        Ok(store)
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, TidyError> {
        self.db.get().ok_or_else(|| TidyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), TidyError> {
        db.connection()
            .call(|conn| -> rusqlite::Result<()> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.config.database_path, "WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, TidyError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> rusqlite::Result<()> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TidyError> {
        match self.db.get() {
            Some(db) => self.checkpoint(db).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    async fn initialize(&self) -> Result<(), TidyError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| TidyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), TidyError> {
        let db = self.db()?;
        self.checkpoint(db).await
    }
}

#[async_trait]
impl BookingStore for SqliteStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), TidyError> {
        queries::bookings::insert_booking(self.db()?, booking).await
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>, TidyError> {
        queries::bookings::get_booking(self.db()?, id).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, TidyError> {
        queries::bookings::list_bookings(self.db()?, filter).await
    }

    async fn upsert_staff(&self, staff: &Staff) -> Result<(), TidyError> {
        queries::staff::upsert_staff(self.db()?, staff).await
    }

    async fn get_staff(&self, id: &StaffId) -> Result<Option<Staff>, TidyError> {
        queries::staff::get_staff(self.db()?, id).await
    }

    async fn list_staff(&self, active_only: bool) -> Result<Vec<Staff>, TidyError> {
        queries::staff::list_staff(self.db()?, active_only).await
    }

    async fn assignments_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Vec<Assignment>, TidyError> {
        queries::assignments::assignments_for_booking(self.db()?, booking_id).await
    }

    async fn staff_schedule(
        &self,
        staff_id: &StaffId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScheduledAssignment>, TidyError> {
        queries::assignments::staff_schedule(self.db()?, staff_id, from, to).await
    }

    async fn status_history(
        &self,
        booking_id: &BookingId,
    ) -> Result<Vec<StatusRecord>, TidyError> {
        queries::history::status_history(self.db()?, booking_id).await
    }

    async fn commit(
        &self,
        changes: ChangeSet,
        now: DateTime<Utc>,
    ) -> Result<CommitReceipt, TidyError> {
        queries::changes::commit(self.db()?, changes, now).await
    }
}

#[async_trait]
impl JobQueue for SqliteStore {
    async fn enqueue(&self, job: NewJob, now: DateTime<Utc>) -> Result<JobId, TidyError> {
        queries::jobs::enqueue(self.db()?, job, now).await
    }

    async fn claim_due_jobs(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Vec<NotificationJob>, TidyError> {
        queries::jobs::claim_due_jobs(self.db()?, limit, now, lease).await
    }

    async fn mark_done(&self, id: JobId, now: DateTime<Utc>) -> Result<(), TidyError> {
        queries::jobs::mark_done(self.db()?, id, now).await
    }

    async fn mark_failed_transient(
        &self,
        id: JobId,
        error: &str,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<JobStatus, TidyError> {
        queries::jobs::mark_failed_transient(self.db()?, id, error, now, policy).await
    }

    async fn mark_failed_permanent(
        &self,
        id: JobId,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TidyError> {
        queries::jobs::mark_failed_permanent(self.db()?, id, error, now).await
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<u64, TidyError> {
        queries::jobs::reclaim_stale(self.db()?, now).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<NotificationJob>, TidyError> {
        queries::jobs::get_job(self.db()?, id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<NotificationJob>, TidyError> {
        queries::jobs::list_jobs(self.db()?, filter).await
    }

    async fn job_stats(&self) -> Result<JobStats, TidyError> {
        queries::jobs::job_stats(self.db()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.display().to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_store_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(&dir.path().join("test.db")));

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(&db_path));

        store.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert!(store.initialize().await.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_tracks_initialization() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(&dir.path().join("health.db")));

        assert!(store.health_check().await.is_err());
        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn queries_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(&dir.path().join("lazy.db")));
        let err = store.job_stats().await.unwrap_err();
        assert!(matches!(err, TidyError::Storage { .. }));
    }
}
