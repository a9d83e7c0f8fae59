// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence collaborator traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::changes::{ChangeSet, CommitReceipt};
use crate::error::TidyError;
use crate::models::{
    Assignment, Booking, BookingFilter, JobFilter, JobStats, NewJob, NotificationJob,
    ScheduledAssignment, Staff, StatusRecord,
};
use crate::retry::RetryPolicy;
use crate::types::{BookingId, JobId, JobStatus, StaffId};

/// Booking, staff, and assignment records.
#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    /// Inserts a new booking. Fails with `Validation` if the id is taken.
    async fn insert_booking(&self, booking: &Booking) -> Result<(), TidyError>;

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>, TidyError>;

    /// Bookings ordered by date, then start time.
    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, TidyError>;

    /// Inserts the staff member or replaces the stored record with the same id.
    async fn upsert_staff(&self, staff: &Staff) -> Result<(), TidyError>;

    async fn get_staff(&self, id: &StaffId) -> Result<Option<Staff>, TidyError>;

    async fn list_staff(&self, active_only: bool) -> Result<Vec<Staff>, TidyError>;

    /// Assignments of one booking, lead first.
    async fn assignments_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Vec<Assignment>, TidyError>;

    /// Assignments of `staff_id` on bookings scheduled between the two dates (inclusive).
    async fn staff_schedule(
        &self,
        staff_id: &StaffId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScheduledAssignment>, TidyError>;

    /// Status history of a booking, oldest first.
    async fn status_history(&self, booking_id: &BookingId)
    -> Result<Vec<StatusRecord>, TidyError>;

    /// Applies a change set in one transaction.
    ///
    /// Fails with `InvalidTransition` when the booking's status no longer
    /// matches the expected `from`, and with `ScheduleConflict` when a guard
    /// finds an overlapping assignment. Nothing is written on failure.
    async fn commit(&self, changes: ChangeSet, now: DateTime<Utc>)
    -> Result<CommitReceipt, TidyError>;
}

/// The durable notification job queue.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Enqueues a single job outside of any change set.
    async fn enqueue(&self, job: NewJob, now: DateTime<Utc>) -> Result<JobId, TidyError>;

    /// Atomically claims up to `limit` due jobs, oldest schedule first.
    ///
    /// Claimed jobs move to `processing` with a lease of `lease` from `now`.
    /// Concurrent callers never receive the same job.
    async fn claim_due_jobs(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Vec<NotificationJob>, TidyError>;

    /// Marks a `processing` job as delivered.
    ///
    /// Outcomes only settle jobs that are still `processing`; a job another
    /// path already settled or reclaimed is left as is. Unknown ids fail
    /// with `NotFound`.
    async fn mark_done(&self, id: JobId, now: DateTime<Utc>) -> Result<(), TidyError>;

    /// Records a transient failure and returns the job's new status
    /// (`pending` for a scheduled retry, `failed` once the budget is spent).
    /// A job that is no longer `processing` is untouched and its current
    /// status is returned.
    async fn mark_failed_transient(
        &self,
        id: JobId,
        error: &str,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<JobStatus, TidyError>;

    /// Records a permanent failure on a `processing` job. The attempt
    /// counter is left as is.
    async fn mark_failed_permanent(
        &self,
        id: JobId,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TidyError>;

    /// Returns `processing` jobs whose lease expired before `now` to `pending`.
    async fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<u64, TidyError>;

    async fn get_job(&self, id: JobId) -> Result<Option<NotificationJob>, TidyError>;

    /// Jobs matching the filter, newest first.
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<NotificationJob>, TidyError>;

    async fn job_stats(&self) -> Result<JobStats, TidyError>;
}

/// A store that serves both records and the queue.
pub trait Store: BookingStore + JobQueue {}

impl<T: BookingStore + JobQueue> Store for T {}
