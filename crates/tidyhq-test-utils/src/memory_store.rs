// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store for deterministic tests.
//!
//! Implements [`BookingStore`] and [`JobQueue`] over plain collections behind
//! one mutex. Change sets are applied to a copy of the state and swapped in
//! only when every step succeeds.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use tidyhq_core::retry::to_time_delta;
use tidyhq_core::{
    AdapterType, Assignment, AssignmentRole, Booking, BookingFilter, BookingId, BookingStatus,
    BookingStore, ChangeSet, CommitReceipt, EntityKind, HealthStatus, JobFilter, JobId, JobQueue,
    JobStats, JobStatus, NewJob, NotificationJob, PluginAdapter, RetryDecision, RetryPolicy,
    ScheduledAssignment, Staff, StaffId, StatusRecord, TidyError, find_conflict, validate_duration,
};

#[derive(Debug, Clone, Default)]
struct State {
    bookings: BTreeMap<String, Booking>,
    next_booking_row: i64,
    staff: BTreeMap<String, Staff>,
    assignments: Vec<Assignment>,
    history: Vec<StatusRecord>,
    jobs: BTreeMap<i64, NotificationJob>,
    next_job_id: i64,
}

impl State {
    fn insert_job(&mut self, job: NewJob, now: DateTime<Utc>) -> JobId {
        self.next_job_id += 1;
        let id = JobId(self.next_job_id);
        self.jobs.insert(
            id.0,
            NotificationJob {
                id,
                channel: job.channel,
                payload: job.payload,
                booking_id: job.booking_id,
                status: JobStatus::Pending,
                attempts: 0,
                max_attempts: job.max_attempts,
                last_error: None,
                scheduled_for: job.not_before.unwrap_or(now),
                locked_until: None,
                created_at: now,
                updated_at: now,
                completed_at: None,
            },
        );
        id
    }

    fn schedule(&self, staff_id: &StaffId, from: NaiveDate, to: NaiveDate) -> Vec<ScheduledAssignment> {
        let mut out: Vec<ScheduledAssignment> = self
            .assignments
            .iter()
            .filter(|a| a.staff_id == *staff_id)
            .filter_map(|a| {
                let booking = self.bookings.get(&a.booking_id.0)?;
                (booking.scheduled_date >= from && booking.scheduled_date <= to).then(|| {
                    ScheduledAssignment {
                        assignment: a.clone(),
                        window: booking.window(),
                        booking_status: booking.status,
                    }
                })
            })
            .collect();
        out.sort_by_key(|s| s.window.start);
        out
    }

    fn job_mut(&mut self, id: JobId) -> Result<&mut NotificationJob, TidyError> {
        self.jobs
            .get_mut(&id.0)
            .ok_or_else(|| TidyError::not_found(EntityKind::Job, id.to_string()))
    }

    fn apply(&mut self, mut changes: ChangeSet, now: DateTime<Utc>) -> Result<CommitReceipt, TidyError> {
        if let Some(change) = &changes.status {
            let booking = self.bookings.get_mut(&change.booking_id.0).ok_or_else(|| {
                TidyError::not_found(EntityKind::Booking, change.booking_id.0.clone())
            })?;
            let current = booking.status;
            if current != change.from || !current.can_transition_to(change.to) {
                return Err(TidyError::InvalidTransition {
                    booking_id: change.booking_id.clone(),
                    from: current,
                    to: change.to,
                });
            }
            booking.status = change.to;
            booking.updated_at = now;
            if change.to == BookingStatus::Cancelled && change.reason.is_some() {
                booking.cancellation_reason = change.reason.clone();
            }
            self.history.push(StatusRecord {
                booking_id: change.booking_id.clone(),
                from: current,
                to: change.to,
                actor: change.actor.clone(),
                reason: change.reason.clone(),
                at: now,
            });
        }

        let moved = changes.status.as_ref().map(|c| &c.booking_id);
        let staffed = changes
            .upserts
            .iter()
            .map(|a| &a.booking_id)
            .chain(changes.removals.iter().map(|(booking_id, _)| booking_id));
        for booking_id in staffed {
            if Some(booking_id) == moved {
                continue;
            }
            let booking = self
                .bookings
                .get(&booking_id.0)
                .ok_or_else(|| TidyError::not_found(EntityKind::Booking, booking_id.0.clone()))?;
            if booking.status.is_terminal() {
                return Err(TidyError::BookingTerminal {
                    booking_id: booking_id.clone(),
                    status: booking.status,
                });
            }
        }

        for guard in &changes.guards {
            let (from, to) = guard.window.lookup_dates();
            let existing = self.schedule(&guard.staff_id, from, to);
            if let Some(hit) = find_conflict(&guard.booking_id, &guard.window, &existing) {
                return Err(TidyError::ScheduleConflict {
                    staff_id: guard.staff_id.clone(),
                    booking_id: guard.booking_id.clone(),
                    conflicting_booking: hit.assignment.booking_id.clone(),
                });
            }
        }

        for (booking_id, staff_id) in &changes.removals {
            let before = self.assignments.len();
            self.assignments
                .retain(|a| !(a.booking_id == *booking_id && a.staff_id == *staff_id));
            if self.assignments.len() == before {
                return Err(TidyError::not_found(
                    EntityKind::Assignment,
                    format!("{booking_id}/{staff_id}"),
                ));
            }
        }

        let mut touched: Vec<BookingId> = changes
            .removals
            .iter()
            .map(|(booking_id, _)| booking_id.clone())
            .chain(changes.upserts.iter().map(|a| a.booking_id.clone()))
            .collect();
        touched.dedup();

        changes
            .upserts
            .sort_by_key(|a| matches!(a.role, AssignmentRole::Lead));
        for upsert in changes.upserts {
            if !self.bookings.contains_key(&upsert.booking_id.0) {
                return Err(TidyError::not_found(EntityKind::Booking, upsert.booking_id.0));
            }
            if !self.staff.contains_key(&upsert.staff_id.0) {
                return Err(TidyError::not_found(EntityKind::Staff, upsert.staff_id.0));
            }
            let existing = self
                .assignments
                .iter_mut()
                .find(|a| a.booking_id == upsert.booking_id && a.staff_id == upsert.staff_id);
            match existing {
                Some(a) => a.role = upsert.role,
                None => self.assignments.push(upsert),
            }
        }
        let leads: Vec<_> = self
            .assignments
            .iter()
            .filter(|a| a.role == AssignmentRole::Lead)
            .map(|a| &a.booking_id)
            .collect();
        for (i, booking_id) in leads.iter().enumerate() {
            if leads[..i].contains(booking_id) {
                return Err(TidyError::storage(std::io::Error::other(format!(
                    "booking {booking_id} would have two leads"
                ))));
            }
        }

        for booking_id in &touched {
            if let Some(booking) = self.bookings.get_mut(&booking_id.0) {
                booking.updated_at = now;
            }
        }

        let job_ids = changes
            .jobs
            .into_iter()
            .map(|job| self.insert_job(job, now))
            .collect();
        Ok(CommitReceipt { job_ids })
    }
}

/// In-memory implementation of the persistence collaborator.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_commits: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `commit` fail with a storage error until reset.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every job, ordered by id.
    pub async fn all_jobs(&self) -> Vec<NotificationJob> {
        self.state.lock().await.jobs.values().cloned().collect()
    }
}

#[async_trait]
impl PluginAdapter for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, TidyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TidyError> {
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), TidyError> {
        validate_duration(&booking.id, booking.duration_minutes)?;
        let mut state = self.state.lock().await;
        if state.bookings.contains_key(&booking.id.0) {
            return Err(TidyError::Validation(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        state.next_booking_row += 1;
        let stored = Booking {
            row_id: Some(state.next_booking_row),
            ..booking.clone()
        };
        state.bookings.insert(booking.id.0.clone(), stored);
        Ok(())
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>, TidyError> {
        Ok(self.state.lock().await.bookings.get(&id.0).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, TidyError> {
        let state = self.state.lock().await;
        let mut out: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .filter(|b| filter.date.is_none_or(|d| b.scheduled_date == d))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.scheduled_date, a.start_time, &a.id).cmp(&(b.scheduled_date, b.start_time, &b.id))
        });
        Ok(out)
    }

    async fn upsert_staff(&self, staff: &Staff) -> Result<(), TidyError> {
        self.state
            .lock()
            .await
            .staff
            .insert(staff.id.0.clone(), staff.clone());
        Ok(())
    }

    async fn get_staff(&self, id: &StaffId) -> Result<Option<Staff>, TidyError> {
        Ok(self.state.lock().await.staff.get(&id.0).cloned())
    }

    async fn list_staff(&self, active_only: bool) -> Result<Vec<Staff>, TidyError> {
        let state = self.state.lock().await;
        let mut out: Vec<Staff> = state
            .staff
            .values()
            .filter(|s| !active_only || s.active)
            .cloned()
            .collect();
        out.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        Ok(out)
    }

    async fn assignments_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Vec<Assignment>, TidyError> {
        let state = self.state.lock().await;
        let mut out: Vec<Assignment> = state
            .assignments
            .iter()
            .filter(|a| a.booking_id == *booking_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            let rank = |x: &Assignment| x.role != AssignmentRole::Lead;
            (rank(a), a.assigned_at, &a.staff_id).cmp(&(rank(b), b.assigned_at, &b.staff_id))
        });
        Ok(out)
    }

    async fn staff_schedule(
        &self,
        staff_id: &StaffId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScheduledAssignment>, TidyError> {
        Ok(self.state.lock().await.schedule(staff_id, from, to))
    }

    async fn status_history(
        &self,
        booking_id: &BookingId,
    ) -> Result<Vec<StatusRecord>, TidyError> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .filter(|r| r.booking_id == *booking_id)
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        changes: ChangeSet,
        now: DateTime<Utc>,
    ) -> Result<CommitReceipt, TidyError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(TidyError::storage(std::io::Error::other(
                "injected commit failure",
            )));
        }
        let mut state = self.state.lock().await;
        let mut draft = state.clone();
        let receipt = draft.apply(changes, now)?;
        *state = draft;
        Ok(receipt)
    }
}

#[async_trait]
impl JobQueue for InMemoryStore {
    async fn enqueue(&self, job: NewJob, now: DateTime<Utc>) -> Result<JobId, TidyError> {
        Ok(self.state.lock().await.insert_job(job, now))
    }

    async fn claim_due_jobs(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Vec<NotificationJob>, TidyError> {
        let mut state = self.state.lock().await;
        let mut due: Vec<&mut NotificationJob> = state
            .jobs
            .values_mut()
            .filter(|j| j.status == JobStatus::Pending && j.scheduled_for <= now)
            .collect();
        due.sort_by_key(|j| (j.scheduled_for, j.id));
        let locked_until = now + to_time_delta(lease);
        Ok(due
            .into_iter()
            .take(limit)
            .map(|job| {
                job.status = JobStatus::Processing;
                job.locked_until = Some(locked_until);
                job.updated_at = now;
                job.clone()
            })
            .collect())
    }

    async fn mark_done(&self, id: JobId, now: DateTime<Utc>) -> Result<(), TidyError> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(id)?;
        if job.status != JobStatus::Processing {
            return Ok(());
        }
        job.status = JobStatus::Done;
        job.locked_until = None;
        job.last_error = None;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn mark_failed_transient(
        &self,
        id: JobId,
        error: &str,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<JobStatus, TidyError> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(id)?;
        if job.status != JobStatus::Processing {
            return Ok(job.status);
        }
        job.last_error = Some(error.to_string());
        job.locked_until = None;
        job.updated_at = now;
        match policy.on_transient_failure(job.attempts, job.max_attempts, now) {
            RetryDecision::Retry {
                attempts,
                scheduled_for,
            } => {
                job.status = JobStatus::Pending;
                job.attempts = attempts;
                job.scheduled_for = scheduled_for;
            }
            RetryDecision::Exhausted => {
                job.status = JobStatus::Failed;
                job.completed_at = Some(now);
            }
        }
        Ok(job.status)
    }

    async fn mark_failed_permanent(
        &self,
        id: JobId,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TidyError> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(id)?;
        if job.status != JobStatus::Processing {
            return Ok(());
        }
        job.status = JobStatus::Failed;
        job.last_error = Some(error.to_string());
        job.locked_until = None;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<u64, TidyError> {
        let mut state = self.state.lock().await;
        let mut reclaimed = 0;
        for job in state.jobs.values_mut() {
            let expired = job.locked_until.is_none_or(|until| until < now);
            if job.status == JobStatus::Processing && expired {
                job.status = JobStatus::Pending;
                job.locked_until = None;
                job.updated_at = now;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<NotificationJob>, TidyError> {
        Ok(self.state.lock().await.jobs.get(&id.0).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<NotificationJob>, TidyError> {
        let state = self.state.lock().await;
        let matching = state
            .jobs
            .values()
            .filter(|j| filter.status.is_none_or(|s| j.status == s))
            .filter(|j| filter.channel.is_none_or(|c| j.channel == c))
            .filter(|j| {
                filter
                    .booking_id
                    .as_ref()
                    .is_none_or(|b| j.booking_id.as_ref() == Some(b))
            });
        let mut out: Vec<NotificationJob> = matching.cloned().collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn job_stats(&self) -> Result<JobStats, TidyError> {
        let state = self.state.lock().await;
        let mut stats = JobStats::default();
        for job in state.jobs.values() {
            stats.record(job.status, 1);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::store_contract_tests!(async { (InMemoryStore::new(), ()) });

    #[tokio::test]
    async fn injected_commit_failure_writes_nothing() {
        let store = InMemoryStore::new();
        store.fail_commits(true);
        let changes = ChangeSet {
            jobs: vec![crate::fixtures::email_job("dana@example.com")],
            ..Default::default()
        };
        let err = store.commit(changes, crate::fixtures::t0()).await.unwrap_err();
        assert!(matches!(err, TidyError::Storage { .. }));
        assert!(store.all_jobs().await.is_empty());
    }
}
