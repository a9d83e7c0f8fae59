// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-facing engine.
//!
//! Every operation returns an [`OperationResult`]; errors cross this
//! boundary only as an [`ErrorKind`](tidyhq_core::ErrorKind) and message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tidyhq_config::TidyConfig;
use tidyhq_core::{
    Assignment, AssignmentRole, Booking, BookingId, BookingStatus, Channel, Clock, EntityKind,
    JobFilter, JobStats, NewJob, NotificationJob, NotificationPayload, OperationResult, StaffId,
    StatusRecord, Store, TidyError,
};
use tidyhq_dispatch::{CycleReport, Dispatcher, DispatcherSettings, HandlerRegistry};
use tracing::{info, warn};

use crate::assignment::{AssignOptions, AssignmentOutcome, AssignmentResolver};
use crate::lifecycle::StateMachine;
use crate::notifications::Composer;

/// Result of one id in a bulk transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionItem {
    pub booking_id: BookingId,
    #[serde(flatten)]
    pub result: OperationResult<Booking>,
}

/// A booking with its team and status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub booking: Booking,
    pub assignments: Vec<Assignment>,
    pub history: Vec<StatusRecord>,
}

/// The booking lifecycle engine.
pub struct Engine<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    lifecycle: StateMachine<S>,
    resolver: AssignmentResolver<S>,
    dispatcher: Arc<Dispatcher<S>>,
    max_attempts: u32,
}

impl<S: Store> Engine<S> {
    pub fn new(
        store: Arc<S>,
        registry: HandlerRegistry,
        clock: Arc<dyn Clock>,
        config: &TidyConfig,
    ) -> Self {
        let max_attempts = config.retry.max_attempts;
        let composer = Arc::new(Composer::new(config.notifications.clone(), max_attempts));
        let settings = DispatcherSettings::from_config(&config.dispatcher, &config.retry);
        Self {
            lifecycle: StateMachine::new(store.clone(), composer.clone(), clock.clone()),
            resolver: AssignmentResolver::new(
                store.clone(),
                composer,
                clock.clone(),
                config.notifications.notify_customer_on_assign,
            ),
            dispatcher: Arc::new(Dispatcher::new(
                store.clone(),
                Arc::new(registry),
                clock.clone(),
                settings,
            )),
            store,
            clock,
            max_attempts,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Shared handle for running the dispatcher's worker loops.
    pub fn dispatcher(&self) -> Arc<Dispatcher<S>> {
        Arc::clone(&self.dispatcher)
    }

    pub async fn transition(
        &self,
        booking_id: &str,
        target: BookingStatus,
        actor: &str,
        reason: Option<&str>,
    ) -> OperationResult<Booking> {
        let result = self
            .lifecycle
            .transition(&BookingId(booking_id.to_string()), target, actor, reason)
            .await;
        report("transition", result)
    }

    pub async fn transition_many(
        &self,
        booking_ids: &[String],
        target: BookingStatus,
        actor: &str,
        reason: Option<&str>,
    ) -> OperationResult<Vec<TransitionItem>> {
        let ids: Vec<BookingId> = booking_ids.iter().map(|id| BookingId(id.clone())).collect();
        let items = self
            .lifecycle
            .transition_many(&ids, target, actor, reason)
            .await
            .into_iter()
            .map(|(booking_id, result)| TransitionItem {
                booking_id,
                result: report("transition", result),
            })
            .collect();
        OperationResult::ok(items)
    }

    pub async fn assign(
        &self,
        booking_id: &str,
        staff_ids: &[String],
        role: AssignmentRole,
        options: AssignOptions,
    ) -> OperationResult<AssignmentOutcome> {
        let staff_ids: Vec<StaffId> = staff_ids.iter().map(|id| StaffId(id.clone())).collect();
        let result = self
            .resolver
            .assign(&BookingId(booking_id.to_string()), &staff_ids, role, options)
            .await;
        report("assign", result)
    }

    pub async fn unassign(&self, booking_id: &str, staff_id: &str) -> OperationResult<Vec<Assignment>> {
        let result = self
            .resolver
            .unassign(
                &BookingId(booking_id.to_string()),
                &StaffId(staff_id.to_string()),
            )
            .await;
        report("unassign", result)
    }

    /// A job carrying the configured retry budget.
    pub fn new_job(&self, channel: Channel, payload: NotificationPayload) -> NewJob {
        NewJob::new(channel, payload).with_max_attempts(self.max_attempts)
    }

    /// Queues an ad-hoc notification.
    pub async fn enqueue_notification(&self, job: NewJob) -> OperationResult<NotificationJob> {
        report("enqueue_notification", self.try_enqueue(job).await)
    }

    async fn try_enqueue(&self, job: NewJob) -> Result<NotificationJob, TidyError> {
        validate_job(&job)?;
        if let Some(booking_id) = &job.booking_id {
            if self.store.get_booking(booking_id).await?.is_none() {
                return Err(TidyError::not_found(EntityKind::Booking, booking_id.0.clone()));
            }
        }
        let id = self.store.enqueue(job, self.clock.now()).await?;
        info!(job_id = %id, "notification enqueued");
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| TidyError::not_found(EntityKind::Job, id.to_string()))
    }

    pub async fn run_dispatch_cycle(&self) -> OperationResult<CycleReport> {
        report("run_dispatch_cycle", self.dispatcher.run_cycle().await)
    }

    pub async fn booking(&self, booking_id: &str) -> OperationResult<BookingDetails> {
        report("booking", self.try_booking(&BookingId(booking_id.to_string())).await)
    }

    async fn try_booking(&self, booking_id: &BookingId) -> Result<BookingDetails, TidyError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| TidyError::not_found(EntityKind::Booking, booking_id.0.clone()))?;
        Ok(BookingDetails {
            assignments: self.store.assignments_for_booking(booking_id).await?,
            history: self.store.status_history(booking_id).await?,
            booking,
        })
    }

    /// The operational notification log, newest first.
    pub async fn notification_log(&self, filter: JobFilter) -> OperationResult<Vec<NotificationJob>> {
        report("notification_log", self.store.list_jobs(&filter).await)
    }

    pub async fn notification_stats(&self) -> OperationResult<JobStats> {
        report("notification_stats", self.store.job_stats().await)
    }
}

fn validate_job(job: &NewJob) -> Result<(), TidyError> {
    let recipient = job.payload.recipient.trim();
    if recipient.is_empty() {
        return Err(TidyError::Validation("notification recipient is empty".into()));
    }
    if job.payload.message.trim().is_empty() {
        return Err(TidyError::Validation("notification message is empty".into()));
    }
    if job.max_attempts == 0 {
        return Err(TidyError::Validation("max_attempts must be at least 1".into()));
    }
    match job.channel {
        Channel::Email if !recipient.contains('@') => Err(TidyError::Validation(format!(
            "`{recipient}` is not an email address"
        ))),
        Channel::Sms if !recipient.starts_with('+') => Err(TidyError::Validation(format!(
            "`{recipient}` is not an E.164 phone number"
        ))),
        Channel::Email | Channel::Sms => Ok(()),
    }
}

/// Converts to the caller envelope, logging what the caller will not see.
fn report<T>(operation: &str, result: Result<T, TidyError>) -> OperationResult<T> {
    if let Err(e) = &result {
        if e.kind().is_validation() {
            info!(operation, kind = %e.kind(), error = %e, "operation rejected");
        } else {
            warn!(operation, kind = %e.kind(), error = %e, "operation failed");
        }
    }
    result.into()
}
