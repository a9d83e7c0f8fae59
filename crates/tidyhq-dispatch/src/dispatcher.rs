// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch cycles and worker loops.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tidyhq_config::model::{DispatcherConfig, RetryConfig};
use tidyhq_core::{
    Clock, JobQueue, JobStatus, NotificationHandler, NotificationJob, RetryPolicy, TidyError,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registry::HandlerRegistry;

/// Tuning knobs for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherSettings {
    pub batch_size: usize,
    pub workers: usize,
    pub max_in_flight: usize,
    pub interval: Duration,
    pub handler_timeout: Duration,
    /// Claim lease; a job still `processing` after this is reclaimed.
    pub stale_after: Duration,
    pub retry: RetryPolicy,
}

impl DispatcherSettings {
    pub fn from_config(dispatcher: &DispatcherConfig, retry: &RetryConfig) -> Self {
        Self {
            batch_size: dispatcher.batch_size,
            workers: dispatcher.workers,
            max_in_flight: dispatcher.max_in_flight,
            interval: dispatcher.interval(),
            handler_timeout: dispatcher.handler_timeout(),
            stale_after: dispatcher.stale_after(),
            retry: retry.policy(),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&DispatcherConfig::default(), &RetryConfig::default())
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Expired claims returned to `pending` before claiming.
    pub reclaimed: u64,
    pub claimed: usize,
    pub delivered: usize,
    /// Transient failures rescheduled with backoff.
    pub retried: usize,
    /// Permanent failures and exhausted budgets.
    pub failed: usize,
    /// Jobs whose outcome could not be recorded; their claim expires and they are reclaimed.
    pub unrecorded: usize,
}

enum Outcome {
    Delivered,
    Retried,
    Failed,
    Unrecorded,
}

/// Drains a [`JobQueue`] through a [`HandlerRegistry`].
pub struct Dispatcher<Q: ?Sized> {
    queue: Arc<Q>,
    registry: Arc<HandlerRegistry>,
    clock: Arc<dyn Clock>,
    settings: DispatcherSettings,
}

impl<Q: JobQueue + ?Sized> Dispatcher<Q> {
    pub fn new(
        queue: Arc<Q>,
        registry: Arc<HandlerRegistry>,
        clock: Arc<dyn Clock>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            queue,
            registry,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Runs one dispatch cycle.
    ///
    /// Only store failures during the sweep or the claim abort the cycle;
    /// per-job failures are recorded on the job and counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, TidyError> {
        let now = self.clock.now();
        let reclaimed = self.queue.reclaim_stale(now).await?;
        if reclaimed > 0 {
            warn!(reclaimed, "expired claims returned to the queue");
        }

        let jobs = self
            .queue
            .claim_due_jobs(self.settings.batch_size, now, self.settings.stale_after)
            .await?;
        let mut report = CycleReport {
            reclaimed,
            claimed: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            debug!("no due notification jobs");
            return Ok(report);
        }

        let outcomes: Vec<Outcome> = futures::stream::iter(jobs)
            .map(|job| self.process(job))
            .buffer_unordered(self.settings.max_in_flight.max(1))
            .collect()
            .await;
        for outcome in outcomes {
            match outcome {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Retried => report.retried += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Unrecorded => report.unrecorded += 1,
            }
        }

        info!(
            claimed = report.claimed,
            delivered = report.delivered,
            retried = report.retried,
            failed = report.failed,
            "dispatch cycle finished"
        );
        Ok(report)
    }

    async fn process(&self, job: NotificationJob) -> Outcome {
        let handler = self.registry.get(job.channel).cloned();
        let result = match &handler {
            Some(handler) => self.deliver(handler.as_ref(), &job).await,
            None => Err(TidyError::permanent(format!(
                "no handler registered for channel {}",
                job.channel
            ))),
        };

        match self.record(&job, result).await {
            Ok((outcome, terminal)) => {
                if terminal {
                    if let Some(handler) = &handler {
                        handler.release(&job).await;
                    }
                }
                outcome
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to record delivery outcome");
                Outcome::Unrecorded
            }
        }
    }

    async fn deliver(
        &self,
        handler: &dyn NotificationHandler,
        job: &NotificationJob,
    ) -> Result<Option<String>, TidyError> {
        let duration = self.settings.handler_timeout;
        match tokio::time::timeout(duration, handler.deliver(job)).await {
            Ok(result) => result.map(|receipt| receipt.provider_id),
            Err(_) => Err(TidyError::Timeout { duration }),
        }
    }

    /// Writes the outcome to the queue. Returns the outcome and whether the job is now terminal.
    async fn record(
        &self,
        job: &NotificationJob,
        result: Result<Option<String>, TidyError>,
    ) -> Result<(Outcome, bool), TidyError> {
        let now = self.clock.now();
        match result {
            Ok(provider_id) => {
                self.queue.mark_done(job.id, now).await?;
                info!(
                    job_id = %job.id,
                    channel = %job.channel,
                    provider_id = provider_id.as_deref().unwrap_or("-"),
                    "notification delivered"
                );
                Ok((Outcome::Delivered, true))
            }
            Err(e) if e.is_permanent_delivery_failure() => {
                self.queue
                    .mark_failed_permanent(job.id, &e.to_string(), now)
                    .await?;
                error!(job_id = %job.id, channel = %job.channel, error = %e, "notification failed permanently");
                Ok((Outcome::Failed, true))
            }
            Err(e) => {
                let status = self
                    .queue
                    .mark_failed_transient(job.id, &e.to_string(), now, &self.settings.retry)
                    .await?;
                match status {
                    JobStatus::Failed => {
                        error!(
                            job_id = %job.id,
                            channel = %job.channel,
                            attempts = job.attempts,
                            error = %e,
                            "notification retry budget exhausted"
                        );
                        Ok((Outcome::Failed, true))
                    }
                    JobStatus::Pending => {
                        warn!(
                            job_id = %job.id,
                            channel = %job.channel,
                            attempt = job.attempts + 1,
                            error = %e,
                            "notification delivery failed, will retry"
                        );
                        Ok((Outcome::Retried, false))
                    }
                    other => {
                        debug!(job_id = %job.id, status = %other, "job already settled");
                        Ok((Outcome::Unrecorded, false))
                    }
                }
            }
        }
    }
}

impl<Q: JobQueue + ?Sized + 'static> Dispatcher<Q> {
    /// Runs `workers` loops, each cycling every `interval`, until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let workers = self.settings.workers.max(1);
        info!(
            workers,
            interval_secs = self.settings.interval.as_secs(),
            batch_size = self.settings.batch_size,
            "notification dispatcher started"
        );

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let dispatcher = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move { dispatcher.worker_loop(worker, cancel).await })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "dispatcher worker panicked");
            }
        }
        info!("notification dispatcher stopped");
    }

    async fn worker_loop(&self, worker: usize, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(worker, "dispatcher worker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(worker, error = %e, "dispatch cycle failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use tidyhq_core::{Channel, JobId, NewJob, NotificationPayload};
    use tidyhq_test_utils::fixtures::{email_job, sms_job, t0};
    use tidyhq_test_utils::{InMemoryStore, ManualClock, MockHandler, Scripted};
    use tracing_test::traced_test;

    struct Harness {
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        email: Arc<MockHandler>,
        sms: Arc<MockHandler>,
        dispatcher: Dispatcher<InMemoryStore>,
    }

    fn harness_with(settings: DispatcherSettings) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let email = Arc::new(MockHandler::new(Channel::Email));
        let sms = Arc::new(MockHandler::new(Channel::Sms));
        let registry = HandlerRegistry::new()
            .with(email.clone())
            .with(sms.clone());
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(registry), clock.clone(), settings);
        Harness {
            store,
            clock,
            email,
            sms,
            dispatcher,
        }
    }

    fn harness() -> Harness {
        harness_with(DispatcherSettings::default())
    }

    impl Harness {
        async fn enqueue(&self, job: NewJob) -> JobId {
            self.store.enqueue(job, self.clock.now()).await.unwrap()
        }

        async fn job(&self, id: JobId) -> NotificationJob {
            self.store.get_job(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn delivers_due_jobs_and_releases_them() {
        let h = harness();
        let email_id = h.enqueue(email_job("dana@example.com")).await;
        let sms_id = h.enqueue(sms_job("+15550100100")).await;
        let later = h
            .enqueue(email_job("ops@example.com").not_before(t0() + TimeDelta::hours(1)))
            .await;

        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.claimed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.retried + report.failed + report.unrecorded, 0);

        for id in [email_id, sms_id] {
            let job = h.job(id).await;
            assert_eq!(job.status, JobStatus::Done);
            assert_eq!(job.completed_at, Some(t0()));
        }
        assert_eq!(h.job(later).await.status, JobStatus::Pending);
        assert_eq!(h.email.released().await, vec![email_id]);
        assert_eq!(h.sms.released().await, vec![sms_id]);
    }

    #[tokio::test]
    async fn empty_queue_is_a_quiet_cycle() {
        let h = harness();
        assert_eq!(h.dispatcher.run_cycle().await.unwrap(), CycleReport::default());
    }

    #[tokio::test]
    #[traced_test]
    async fn transient_failure_backs_off_then_succeeds() {
        let h = harness();
        h.sms.push(Scripted::Transient("gateway 503".into())).await;
        let id = h.enqueue(sms_job("+15550100100")).await;

        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.retried, 1);
        let job = h.job(id).await;
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.scheduled_for, t0() + TimeDelta::seconds(120));
        assert!(job.last_error.unwrap().contains("gateway 503"));
        assert!(h.sms.released().await.is_empty());
        assert!(logs_contain("will retry"));

        h.clock.advance(TimeDelta::seconds(119));
        assert_eq!(h.dispatcher.run_cycle().await.unwrap().claimed, 0);

        h.clock.advance(TimeDelta::seconds(1));
        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(h.job(id).await.status, JobStatus::Done);
        assert_eq!(h.sms.released().await, vec![id]);
    }

    #[tokio::test]
    #[traced_test]
    async fn exhausted_budget_fails_once_and_for_all() {
        let h = harness();
        h.email.always(Scripted::Transient("451 try later".into())).await;
        let id = h.enqueue(email_job("dana@example.com")).await;

        for attempt in 1..=5 {
            let report = h.dispatcher.run_cycle().await.unwrap();
            assert_eq!(report.retried, 1, "attempt {attempt}");
            let job = h.job(id).await;
            assert_eq!(job.attempts, attempt);
            h.clock.set(job.scheduled_for);
        }

        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        let job = h.job(id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 5);
        assert_eq!(h.email.released().await, vec![id]);
        assert!(logs_contain("retry budget exhausted"));

        h.clock.advance(TimeDelta::days(7));
        assert_eq!(h.dispatcher.run_cycle().await.unwrap().claimed, 0);
        assert_eq!(h.email.calls(), 6);
    }

    #[tokio::test]
    #[traced_test]
    async fn permanent_failure_is_not_retried() {
        let h = harness();
        h.email.push(Scripted::Permanent("550 no such user".into())).await;
        let id = h.enqueue(email_job("ghost@example.com")).await;

        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        let job = h.job(id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 0);
        assert_eq!(h.email.released().await, vec![id]);
        assert!(logs_contain("failed permanently"));
    }

    #[tokio::test]
    async fn unrouted_channel_fails_permanently() {
        let store = Arc::new(InMemoryStore::new());
        let registry = HandlerRegistry::new().with(Arc::new(MockHandler::new(Channel::Email)));
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(ManualClock::new(t0())),
            DispatcherSettings::default(),
        );
        let id = store.enqueue(sms_job("+15550100100"), t0()).await.unwrap();

        let report = dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.last_error.unwrap().contains("no handler registered for channel sms"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_handler_times_out_as_transient() {
        let h = harness_with(DispatcherSettings {
            handler_timeout: Duration::from_secs(5),
            ..DispatcherSettings::default()
        });
        h.email.push(Scripted::Hang).await;
        let id = h.enqueue(email_job("dana@example.com")).await;

        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.retried, 1);
        let job = h.job(id).await;
        assert_eq!(job.attempts, 1);
        assert!(job.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn expired_claims_are_swept_and_redelivered() {
        let h = harness();
        let id = h.enqueue(email_job("dana@example.com")).await;
        // A worker that died mid-delivery.
        h.store
            .claim_due_jobs(1, t0(), Duration::from_secs(300))
            .await
            .unwrap();

        h.clock.advance(TimeDelta::seconds(100));
        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!((report.reclaimed, report.claimed), (0, 0));

        h.clock.advance(TimeDelta::seconds(201));
        let report = h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(report.reclaimed, 1);
        assert_eq!(report.delivered, 1);
        let job = h.job(id).await;
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test]
    async fn batch_size_caps_each_cycle() {
        let h = harness_with(DispatcherSettings {
            batch_size: 3,
            max_in_flight: 2,
            ..DispatcherSettings::default()
        });
        for i in 0..7 {
            h.enqueue(email_job(&format!("c{i}@example.com"))).await;
        }
        let mut claimed = Vec::new();
        for _ in 0..3 {
            claimed.push(h.dispatcher.run_cycle().await.unwrap().claimed);
        }
        assert_eq!(claimed, vec![3, 3, 1]);
        assert_eq!(h.email.delivered().await.len(), 7);
    }

    #[tokio::test]
    async fn payload_reaches_the_handler_unchanged() {
        let h = harness();
        let payload = NotificationPayload::email("dana@example.com", "Booking confirmed", "Friday 9:00")
            .with_html("<p>Friday 9:00</p>");
        h.enqueue(NewJob::new(Channel::Email, payload.clone())).await;
        h.dispatcher.run_cycle().await.unwrap();
        assert_eq!(h.email.delivered().await[0].payload, payload);
    }

    #[tokio::test(start_paused = true)]
    async fn workers_drain_queue_until_cancelled() {
        let h = harness_with(DispatcherSettings {
            workers: 2,
            batch_size: 2,
            interval: Duration::from_secs(1),
            ..DispatcherSettings::default()
        });
        for i in 0..6 {
            h.enqueue(sms_job(&format!("+1555010010{i}"))).await;
        }
        let Harness {
            store, dispatcher, sms, ..
        } = h;
        let dispatcher = Arc::new(dispatcher);
        let cancel = CancellationToken::new();
        let running = tokio::spawn(dispatcher.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        running.await.unwrap();

        assert_eq!(store.job_stats().await.unwrap().done, 6);
        let mut ids: Vec<JobId> = sms.delivered().await.iter().map(|j| j.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6, "no job delivered twice");
    }
}
