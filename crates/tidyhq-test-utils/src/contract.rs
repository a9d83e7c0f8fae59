// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavioural checks shared by every [`Store`] implementation.
//!
//! Each check takes a fresh, empty store and panics on the first violated
//! expectation. [`store_contract_tests!`](crate::store_contract_tests)
//! expands them into one `#[tokio::test]` per check.

use std::collections::HashSet;
use std::time::Duration;

use chrono::TimeDelta;
use tidyhq_core::{
    Assignment, AssignmentRole, Booking, BookingFilter, BookingId, BookingStatus, Channel, ChangeSet,
    JobFilter, JobId, JobStatus, RetryPolicy, ScheduleGuard, StaffId, StatusChange, Store,
    TidyError,
};

use crate::fixtures::{booking, email_job, sms_job, staff, t0};

const LEASE: Duration = Duration::from_secs(300);

/// Expands the whole contract into `#[tokio::test]` functions.
///
/// `$make` is an expression evaluating to a future of `(store, guard)`; the
/// guard (e.g. a temp dir) is kept alive for the duration of the test.
#[macro_export]
macro_rules! store_contract_tests {
    ($make:expr) => {
        $crate::store_contract_tests!(@each $make;
            enqueue_starts_pending,
            enqueue_honours_not_before,
            claim_takes_due_jobs_oldest_first,
            claim_respects_limit,
            concurrent_claims_never_overlap,
            transient_failure_reschedules_with_backoff,
            exhausted_budget_fails_for_good,
            permanent_failure_keeps_attempts,
            done_jobs_stay_done,
            settled_jobs_ignore_late_outcomes,
            reclaim_returns_only_expired_leases,
            unknown_jobs_are_not_found,
            log_filters_and_stats,
            status_change_writes_history_and_jobs,
            stale_status_rolls_back_everything,
            guard_conflict_rolls_back_everything,
            guard_ignores_touching_and_cancelled,
            guard_sees_bookings_crossing_midnight,
            upsert_demotes_previous_lead,
            missing_removal_is_not_found,
            terminal_bookings_refuse_assignment_changes,
            bookings_and_staff_round_trip,
            overlong_bookings_are_rejected
        );
    };
    (@each $make:expr; $($name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let (store, _guard) = $make.await;
                $crate::contract::$name(&store).await;
            }
        )*
    };
}

async fn seed<S: Store>(store: &S) {
    for (id, name) in [("S1", "Ana"), ("S2", "Bo"), ("S3", "Cy")] {
        store.upsert_staff(&staff(id, name)).await.unwrap();
    }
}

fn lead(booking_id: &str, staff_id: &str) -> Assignment {
    Assignment {
        booking_id: BookingId(booking_id.into()),
        staff_id: StaffId(staff_id.into()),
        role: AssignmentRole::Lead,
        assigned_at: t0(),
    }
}

fn assistant(booking_id: &str, staff_id: &str) -> Assignment {
    Assignment {
        role: AssignmentRole::Assistant,
        ..lead(booking_id, staff_id)
    }
}

fn guard(staff_id: &str, b: &Booking) -> ScheduleGuard {
    ScheduleGuard {
        staff_id: StaffId(staff_id.into()),
        booking_id: b.id.clone(),
        window: b.window(),
    }
}

pub async fn enqueue_starts_pending<S: Store>(store: &S) {
    let id = store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
    let job = store.get_job(id).await.unwrap().expect("job stored");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.max_attempts, 5);
    assert_eq!(job.scheduled_for, t0());
    assert_eq!(job.channel, Channel::Email);
    assert_eq!(job.payload.recipient, "dana@example.com");
    assert!(job.locked_until.is_none());
    assert!(job.completed_at.is_none());
}

pub async fn enqueue_honours_not_before<S: Store>(store: &S) {
    let later = t0() + TimeDelta::hours(1);
    let id = store
        .enqueue(sms_job("+15550100100").not_before(later), t0())
        .await
        .unwrap();
    assert!(store.claim_due_jobs(10, t0(), LEASE).await.unwrap().is_empty());
    let claimed = store.claim_due_jobs(10, later, LEASE).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);
}

pub async fn claim_takes_due_jobs_oldest_first<S: Store>(store: &S) {
    let late = store
        .enqueue(email_job("b@example.com").not_before(t0() - TimeDelta::minutes(1)), t0())
        .await
        .unwrap();
    let early = store
        .enqueue(email_job("a@example.com").not_before(t0() - TimeDelta::minutes(5)), t0())
        .await
        .unwrap();
    let future = store
        .enqueue(email_job("c@example.com").not_before(t0() + TimeDelta::minutes(5)), t0())
        .await
        .unwrap();

    let claimed = store.claim_due_jobs(10, t0(), LEASE).await.unwrap();
    let ids: Vec<JobId> = claimed.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![early, late]);
    for job in &claimed {
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.locked_until, Some(t0() + TimeDelta::seconds(300)));
    }
    assert!(store.claim_due_jobs(10, t0(), LEASE).await.unwrap().is_empty());

    let stored = store.get_job(future).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
}

pub async fn claim_respects_limit<S: Store>(store: &S) {
    for _ in 0..5 {
        store.enqueue(sms_job("+15550100100"), t0()).await.unwrap();
    }
    assert_eq!(store.claim_due_jobs(3, t0(), LEASE).await.unwrap().len(), 3);
    assert_eq!(store.claim_due_jobs(3, t0(), LEASE).await.unwrap().len(), 2);
    assert!(store.claim_due_jobs(0, t0(), LEASE).await.unwrap().is_empty());
}

pub async fn concurrent_claims_never_overlap<S: Store>(store: &S) {
    for _ in 0..20 {
        store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
    }
    let (a, b, c, d) = futures::join!(
        store.claim_due_jobs(7, t0(), LEASE),
        store.claim_due_jobs(7, t0(), LEASE),
        store.claim_due_jobs(7, t0(), LEASE),
        store.claim_due_jobs(7, t0(), LEASE),
    );
    let mut seen = HashSet::new();
    for batch in [a, b, c, d] {
        for job in batch.unwrap() {
            assert!(seen.insert(job.id), "job {} handed out twice", job.id);
        }
    }
    assert_eq!(seen.len(), 20);
}

pub async fn transient_failure_reschedules_with_backoff<S: Store>(store: &S) {
    let policy = RetryPolicy::default();
    let id = store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
    store.claim_due_jobs(1, t0(), LEASE).await.unwrap();

    let status = store
        .mark_failed_transient(id, "smtp 451 try later", t0(), &policy)
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Pending);

    let job = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.attempts, 1);
    assert_eq!(job.scheduled_for, t0() + TimeDelta::seconds(120));
    assert_eq!(job.last_error.as_deref(), Some("smtp 451 try later"));
    assert!(job.locked_until.is_none());

    let almost = t0() + TimeDelta::seconds(119);
    assert!(store.claim_due_jobs(1, almost, LEASE).await.unwrap().is_empty());
    let due = t0() + TimeDelta::seconds(120);
    assert_eq!(store.claim_due_jobs(1, due, LEASE).await.unwrap().len(), 1);
}

pub async fn exhausted_budget_fails_for_good<S: Store>(store: &S) {
    let policy = RetryPolicy::default();
    let id = store.enqueue(sms_job("+15550100100"), t0()).await.unwrap();
    let mut now = t0();

    for expected in 1..=5 {
        let claimed = store.claim_due_jobs(1, now, LEASE).await.unwrap();
        assert_eq!(claimed.len(), 1, "retry {expected} should be claimable");
        let status = store
            .mark_failed_transient(id, "gateway 503", now, &policy)
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Pending);
        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.attempts, expected);
        now = job.scheduled_for;
    }

    store.claim_due_jobs(1, now, LEASE).await.unwrap();
    let status = store
        .mark_failed_transient(id, "gateway 503", now, &policy)
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Failed);

    let job = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.attempts, 5);
    assert!(job.attempts <= job.max_attempts);
    assert!(job.completed_at.is_some());

    let far = now + TimeDelta::days(30);
    assert!(store.claim_due_jobs(10, far, LEASE).await.unwrap().is_empty());
}

pub async fn permanent_failure_keeps_attempts<S: Store>(store: &S) {
    let policy = RetryPolicy::default();
    let id = store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
    store.claim_due_jobs(1, t0(), LEASE).await.unwrap();
    store
        .mark_failed_transient(id, "timeout", t0(), &policy)
        .await
        .unwrap();

    let later = t0() + TimeDelta::seconds(120);
    store.claim_due_jobs(1, later, LEASE).await.unwrap();
    store
        .mark_failed_permanent(id, "550 mailbox unavailable", later)
        .await
        .unwrap();

    let job = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.last_error.as_deref(), Some("550 mailbox unavailable"));
}

pub async fn done_jobs_stay_done<S: Store>(store: &S) {
    let id = store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
    store.claim_due_jobs(1, t0(), LEASE).await.unwrap();
    store.mark_done(id, t0()).await.unwrap();

    let status = store
        .mark_failed_transient(id, "late failure", t0(), &RetryPolicy::default())
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Done);

    let job = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.completed_at, Some(t0()));
    assert!(job.locked_until.is_none());
    assert!(job.last_error.is_none());
}

pub async fn settled_jobs_ignore_late_outcomes<S: Store>(store: &S) {
    let id = store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
    store.claim_due_jobs(1, t0(), LEASE).await.unwrap();
    store.mark_done(id, t0()).await.unwrap();

    let later = t0() + TimeDelta::seconds(5);
    store
        .mark_failed_permanent(id, "late rejection", later)
        .await
        .unwrap();
    store.mark_done(id, later).await.unwrap();

    let job = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.completed_at, Some(t0()));
    assert!(job.last_error.is_none());

    // A worker whose lease was reclaimed reports after the job went back to pending.
    let other = store.enqueue(sms_job("+15550100100"), t0()).await.unwrap();
    store.claim_due_jobs(1, t0(), LEASE).await.unwrap();
    let expired = t0() + TimeDelta::seconds(301);
    assert_eq!(store.reclaim_stale(expired).await.unwrap(), 1);
    store
        .mark_failed_permanent(other, "stale worker", expired)
        .await
        .unwrap();
    let status = store
        .mark_failed_transient(other, "stale worker", expired, &RetryPolicy::default())
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Pending);
    let job = store.get_job(other).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.last_error.is_none());

    let err = store
        .mark_failed_permanent(JobId(999), "x", later)
        .await
        .unwrap_err();
    assert!(matches!(err, TidyError::NotFound { .. }), "{err}");
}

pub async fn reclaim_returns_only_expired_leases<S: Store>(store: &S) {
    let id = store.enqueue(email_job("dana@example.com"), t0()).await.unwrap();
    store.claim_due_jobs(1, t0(), LEASE).await.unwrap();

    let within = t0() + TimeDelta::seconds(100);
    assert_eq!(store.reclaim_stale(within).await.unwrap(), 0);

    let past = t0() + TimeDelta::seconds(301);
    assert_eq!(store.reclaim_stale(past).await.unwrap(), 1);
    let job = store.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.locked_until.is_none());

    assert_eq!(store.claim_due_jobs(1, past, LEASE).await.unwrap().len(), 1);
}

pub async fn unknown_jobs_are_not_found<S: Store>(store: &S) {
    assert!(store.get_job(JobId(999)).await.unwrap().is_none());
    let err = store.mark_done(JobId(999), t0()).await.unwrap_err();
    assert!(matches!(err, TidyError::NotFound { .. }), "{err}");
    let err = store
        .mark_failed_transient(JobId(999), "x", t0(), &RetryPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TidyError::NotFound { .. }), "{err}");
}

pub async fn log_filters_and_stats<S: Store>(store: &S) {
    let b1 = BookingId("B1".into());
    let first = store
        .enqueue(email_job("dana@example.com").for_booking(b1.clone()), t0())
        .await
        .unwrap();
    let second = store
        .enqueue(sms_job("+15550100100").for_booking(b1.clone()), t0() + TimeDelta::seconds(1))
        .await
        .unwrap();
    let third = store
        .enqueue(email_job("ops@example.com"), t0() + TimeDelta::seconds(2))
        .await
        .unwrap();
    store.claim_due_jobs(1, t0(), LEASE).await.unwrap();
    store.mark_done(first, t0()).await.unwrap();

    let all = store.list_jobs(&JobFilter::default()).await.unwrap();
    let ids: Vec<JobId> = all.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![third, second, first]);

    let for_b1 = store
        .list_jobs(&JobFilter {
            booking_id: Some(b1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(for_b1.len(), 2);

    let sms = store
        .list_jobs(&JobFilter {
            channel: Some(Channel::Sms),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(sms.len(), 1);
    assert_eq!(sms[0].id, second);

    let limited = store
        .list_jobs(&JobFilter {
            status: Some(JobStatus::Pending),
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, third);

    let stats = store.job_stats().await.unwrap();
    assert_eq!((stats.pending, stats.processing, stats.done, stats.failed), (2, 0, 1, 0));
}

pub async fn status_change_writes_history_and_jobs<S: Store>(store: &S) {
    let b = booking("B1", "2026-05-02", "09:00", 120);
    store.insert_booking(&b).await.unwrap();

    let changes = ChangeSet {
        status: Some(StatusChange {
            booking_id: b.id.clone(),
            from: BookingStatus::Pending,
            to: BookingStatus::Cancelled,
            actor: "admin".into(),
            reason: Some("customer moved".into()),
        }),
        jobs: vec![
            email_job("dana@example.com").for_booking(b.id.clone()),
            sms_job("+15550100100").for_booking(b.id.clone()),
        ],
        ..Default::default()
    };
    let now = t0() + TimeDelta::minutes(10);
    let receipt = store.commit(changes, now).await.unwrap();
    assert_eq!(receipt.job_ids.len(), 2);

    let stored = store.get_booking(&b.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(stored.cancellation_reason.as_deref(), Some("customer moved"));
    assert_eq!(stored.updated_at, now);

    let history = store.status_history(&b.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, BookingStatus::Pending);
    assert_eq!(history[0].to, BookingStatus::Cancelled);
    assert_eq!(history[0].actor, "admin");
    assert_eq!(history[0].at, now);

    for id in receipt.job_ids {
        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.booking_id.as_ref(), Some(&b.id));
        assert_eq!(job.status, JobStatus::Pending);
    }
}

pub async fn stale_status_rolls_back_everything<S: Store>(store: &S) {
    seed(store).await;
    let b = booking("B1", "2026-05-02", "09:00", 120);
    store.insert_booking(&b).await.unwrap();

    let changes = ChangeSet {
        status: Some(StatusChange {
            booking_id: b.id.clone(),
            from: BookingStatus::Confirmed,
            to: BookingStatus::Completed,
            actor: "admin".into(),
            reason: None,
        }),
        upserts: vec![lead("B1", "S1")],
        jobs: vec![email_job("dana@example.com")],
        ..Default::default()
    };
    let err = store.commit(changes, t0()).await.unwrap_err();
    assert!(
        matches!(
            err,
            TidyError::InvalidTransition {
                from: BookingStatus::Pending,
                to: BookingStatus::Completed,
                ..
            }
        ),
        "{err}"
    );

    let stored = store.get_booking(&b.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
    assert!(store.assignments_for_booking(&b.id).await.unwrap().is_empty());
    assert!(store.status_history(&b.id).await.unwrap().is_empty());
    assert_eq!(store.job_stats().await.unwrap().pending, 0);
}

pub async fn guard_conflict_rolls_back_everything<S: Store>(store: &S) {
    seed(store).await;
    let b2 = booking("B2", "2026-05-02", "10:00", 120);
    let b3 = booking("B3", "2026-05-02", "11:00", 60);
    store.insert_booking(&b2).await.unwrap();
    store.insert_booking(&b3).await.unwrap();
    store
        .commit(
            ChangeSet {
                upserts: vec![lead("B2", "S1")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();

    let changes = ChangeSet {
        guards: vec![guard("S1", &b3)],
        upserts: vec![lead("B3", "S1")],
        jobs: vec![email_job("s1@crew.example.com")],
        ..Default::default()
    };
    let err = store.commit(changes, t0()).await.unwrap_err();
    match err {
        TidyError::ScheduleConflict {
            staff_id,
            booking_id,
            conflicting_booking,
        } => {
            assert_eq!(staff_id.0, "S1");
            assert_eq!(booking_id.0, "B3");
            assert_eq!(conflicting_booking.0, "B2");
        }
        other => panic!("expected conflict, got {other}"),
    }
    assert!(store.assignments_for_booking(&b3.id).await.unwrap().is_empty());
    assert_eq!(store.job_stats().await.unwrap().pending, 0);
}

pub async fn guard_ignores_touching_and_cancelled<S: Store>(store: &S) {
    seed(store).await;
    let early = booking("B1", "2026-05-02", "08:00", 120);
    let cancelled = booking("B2", "2026-05-02", "10:00", 180);
    let next = booking("B3", "2026-05-02", "10:00", 60);
    for b in [&early, &cancelled, &next] {
        store.insert_booking(b).await.unwrap();
    }
    store
        .commit(
            ChangeSet {
                upserts: vec![lead("B1", "S1"), lead("B2", "S1")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    store
        .commit(
            ChangeSet {
                status: Some(StatusChange {
                    booking_id: cancelled.id.clone(),
                    from: BookingStatus::Pending,
                    to: BookingStatus::Cancelled,
                    actor: "admin".into(),
                    reason: None,
                }),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();

    store
        .commit(
            ChangeSet {
                guards: vec![guard("S1", &next)],
                upserts: vec![lead("B3", "S1")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .expect("back-to-back and cancelled bookings do not conflict");
}

pub async fn guard_sees_bookings_crossing_midnight<S: Store>(store: &S) {
    seed(store).await;
    let late = booking("B1", "2026-05-01", "23:00", 120);
    let early = booking("B2", "2026-05-02", "00:30", 60);
    store.insert_booking(&late).await.unwrap();
    store.insert_booking(&early).await.unwrap();
    store
        .commit(
            ChangeSet {
                upserts: vec![lead("B1", "S2")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();

    let err = store
        .commit(
            ChangeSet {
                guards: vec![guard("S2", &early)],
                upserts: vec![lead("B2", "S2")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TidyError::ScheduleConflict { .. }), "{err}");
}

pub async fn upsert_demotes_previous_lead<S: Store>(store: &S) {
    seed(store).await;
    let b = booking("B1", "2026-05-02", "09:00", 120);
    store.insert_booking(&b).await.unwrap();
    store
        .commit(
            ChangeSet {
                upserts: vec![lead("B1", "S1"), assistant("B1", "S3")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();

    // Listed lead-first on purpose: stores must order demotions before promotions.
    store
        .commit(
            ChangeSet {
                upserts: vec![lead("B1", "S2"), assistant("B1", "S1")],
                ..Default::default()
            },
            t0() + TimeDelta::minutes(1),
        )
        .await
        .unwrap();

    let assignments = store.assignments_for_booking(&b.id).await.unwrap();
    let roles: Vec<(&str, AssignmentRole)> = assignments
        .iter()
        .map(|a| (a.staff_id.0.as_str(), a.role))
        .collect();
    assert_eq!(roles[0], ("S2", AssignmentRole::Lead));
    assert_eq!(roles.len(), 3);
    assert_eq!(
        assignments
            .iter()
            .filter(|a| a.role == AssignmentRole::Lead)
            .count(),
        1
    );
    let s1 = assignments.iter().find(|a| a.staff_id.0 == "S1").unwrap();
    assert_eq!(s1.role, AssignmentRole::Assistant);
    assert_eq!(s1.assigned_at, t0(), "re-assignment keeps the original time");
}

pub async fn missing_removal_is_not_found<S: Store>(store: &S) {
    seed(store).await;
    let b = booking("B1", "2026-05-02", "09:00", 120);
    store.insert_booking(&b).await.unwrap();
    store
        .commit(
            ChangeSet {
                upserts: vec![lead("B1", "S1")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();

    let err = store
        .commit(
            ChangeSet {
                removals: vec![(b.id.clone(), StaffId("S2".into()))],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TidyError::NotFound { .. }), "{err}");

    store
        .commit(
            ChangeSet {
                removals: vec![(b.id.clone(), StaffId("S1".into()))],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    assert!(store.assignments_for_booking(&b.id).await.unwrap().is_empty());
    let stored = store.get_booking(&b.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
}

pub async fn terminal_bookings_refuse_assignment_changes<S: Store>(store: &S) {
    seed(store).await;
    let b = booking("B1", "2026-05-02", "09:00", 120);
    store.insert_booking(&b).await.unwrap();
    store
        .commit(
            ChangeSet {
                upserts: vec![lead("B1", "S1")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    store
        .commit(
            ChangeSet {
                status: Some(StatusChange {
                    booking_id: b.id.clone(),
                    from: BookingStatus::Pending,
                    to: BookingStatus::Cancelled,
                    actor: "admin".into(),
                    reason: None,
                }),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();

    let err = store
        .commit(
            ChangeSet {
                upserts: vec![assistant("B1", "S2")],
                jobs: vec![email_job("s2@crew.example.com").for_booking(b.id.clone())],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, TidyError::BookingTerminal { status: BookingStatus::Cancelled, .. }),
        "{err}"
    );
    let err = store
        .commit(
            ChangeSet {
                removals: vec![(b.id.clone(), StaffId("S1".into()))],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TidyError::BookingTerminal { .. }), "{err}");

    let team = store.assignments_for_booking(&b.id).await.unwrap();
    assert_eq!(team.len(), 1);
    assert_eq!(team[0].staff_id, StaffId("S1".into()));
    assert_eq!(store.job_stats().await.unwrap().pending, 0);

    // Moving a live booking and staffing it in the same set is fine.
    let b2 = booking("B2", "2026-05-03", "09:00", 120);
    store.insert_booking(&b2).await.unwrap();
    store
        .commit(
            ChangeSet {
                status: Some(StatusChange {
                    booking_id: b2.id.clone(),
                    from: BookingStatus::Pending,
                    to: BookingStatus::Confirmed,
                    actor: "assignment".into(),
                    reason: None,
                }),
                upserts: vec![lead("B2", "S2")],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(store.assignments_for_booking(&b2.id).await.unwrap().len(), 1);
}

pub async fn bookings_and_staff_round_trip<S: Store>(store: &S) {
    seed(store).await;
    let mut inactive = staff("S9", "Zed");
    inactive.active = false;
    store.upsert_staff(&inactive).await.unwrap();

    let active: Vec<String> = store
        .list_staff(true)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id.0)
        .collect();
    assert_eq!(active, ["S1", "S2", "S3"]);
    assert_eq!(store.list_staff(false).await.unwrap().len(), 4);
    assert_eq!(
        store.get_staff(&"S9".into()).await.unwrap().map(|s| s.active),
        Some(false)
    );

    let b = booking("B1", "2026-05-02", "09:00", 120);
    store.insert_booking(&b).await.unwrap();
    let err = store.insert_booking(&b).await.unwrap_err();
    assert!(matches!(err, TidyError::Validation(_)), "{err}");

    let stored = store.get_booking(&b.id).await.unwrap().unwrap();
    assert!(stored.row_id.is_some());
    assert_eq!(stored.customer, b.customer);
    assert_eq!(stored.window(), b.window());

    let listed = store
        .list_bookings(&BookingFilter {
            status: Some(BookingStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

pub async fn overlong_bookings_are_rejected<S: Store>(store: &S) {
    let err = store
        .insert_booking(&booking("B1", "2026-05-02", "08:00", 2880))
        .await
        .unwrap_err();
    assert!(matches!(err, TidyError::Validation(_)), "{err}");
    assert!(store.get_booking(&"B1".into()).await.unwrap().is_none());

    let err = store
        .insert_booking(&booking("B2", "2026-05-02", "08:00", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, TidyError::Validation(_)), "{err}");

    store
        .insert_booking(&booking("B3", "2026-05-02", "08:00", 1440))
        .await
        .unwrap();
}
