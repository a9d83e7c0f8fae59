// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification job queue operations.
//!
//! Claims are a single conditional `UPDATE ... RETURNING`, so concurrent
//! workers (even in separate processes) never receive the same job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tidyhq_core::retry::to_time_delta;
use tidyhq_core::{
    BookingId, EntityKind, JobFilter, JobId, JobStats, JobStatus, NewJob, NotificationJob,
    RetryDecision, RetryPolicy, TidyError,
};
use tracing::debug;

use crate::codec;
use crate::database::{Database, map_tr_err};

const JOB_COLUMNS: &str = "id, channel, payload, booking_id, status, attempts, max_attempts, \
     last_error, scheduled_for, locked_until, created_at, updated_at, completed_at";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationJob> {
    Ok(NotificationJob {
        id: JobId(row.get(0)?),
        channel: codec::get_enum(row, 1)?,
        payload: codec::get_json(row, 2)?,
        booking_id: row.get::<_, Option<String>>(3)?.map(BookingId),
        status: codec::get_enum(row, 4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        last_error: row.get(7)?,
        scheduled_for: codec::get_ts(row, 8)?,
        locked_until: codec::get_opt_ts(row, 9)?,
        created_at: codec::get_ts(row, 10)?,
        updated_at: codec::get_ts(row, 11)?,
        completed_at: codec::get_opt_ts(row, 12)?,
    })
}

/// Inserts a `pending` job with zero attempts.
pub fn insert(conn: &Connection, job: &NewJob, now: DateTime<Utc>) -> rusqlite::Result<JobId> {
    let scheduled_for = job.not_before.unwrap_or(now);
    conn.execute(
        "INSERT INTO notification_jobs
             (channel, payload, booking_id, status, attempts, max_attempts, scheduled_for,
              created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?6, ?6)",
        params![
            job.channel.to_string(),
            codec::to_json(&job.payload)?,
            job.booking_id.as_ref().map(|b| b.0.as_str()),
            job.max_attempts,
            codec::ts(scheduled_for),
            codec::ts(now),
        ],
    )?;
    Ok(JobId(conn.last_insert_rowid()))
}

fn find(conn: &Connection, id: JobId) -> rusqlite::Result<Option<NotificationJob>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM notification_jobs WHERE id = ?1"),
        params![id.0],
        job_from_row,
    )
    .optional()
}

/// Enqueue a new job. Returns the auto-generated job ID.
pub async fn enqueue(db: &Database, job: NewJob, now: DateTime<Utc>) -> Result<JobId, TidyError> {
    let id = db
        .connection()
        .call(move |conn| insert(conn, &job, now))
        .await
        .map_err(map_tr_err)?;
    debug!(job_id = %id, "job enqueued");
    Ok(id)
}

/// Claim up to `limit` due jobs, oldest schedule first, leasing them until `now + lease`.
pub async fn claim_due_jobs(
    db: &Database,
    limit: usize,
    now: DateTime<Utc>,
    lease: Duration,
) -> Result<Vec<NotificationJob>, TidyError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let now_text = codec::ts(now);
    let locked_until = codec::ts(now + to_time_delta(lease));
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut claimed = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Vec<NotificationJob>> {
            let mut stmt = conn.prepare(&format!(
                "UPDATE notification_jobs
                 SET status = 'processing', locked_until = ?1, updated_at = ?2
                 WHERE id IN (
                     SELECT id FROM notification_jobs
                     WHERE status = 'pending' AND scheduled_for <= ?2
                     ORDER BY scheduled_for ASC, id ASC
                     LIMIT ?3
                 ) AND status = 'pending'
                 RETURNING {JOB_COLUMNS}"
            ))?;
            let rows = stmt.query_map(params![locked_until, now_text, limit], job_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    // RETURNING yields rows in no particular order.
    claimed.sort_by(|a, b| (a.scheduled_for, a.id).cmp(&(b.scheduled_for, b.id)));
    Ok(claimed)
}

/// Mark a `processing` job as delivered.
///
/// Jobs in any other status are left untouched.
pub async fn mark_done(db: &Database, id: JobId, now: DateTime<Utc>) -> Result<(), TidyError> {
    let now = codec::ts(now);
    let settled = db
        .connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let updated = conn.execute(
                "UPDATE notification_jobs
                 SET status = 'done', locked_until = NULL, last_error = NULL,
                     completed_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND status = 'processing'",
                params![now, id.0],
            )?;
            Ok(updated > 0 || exists(conn, id)?)
        })
        .await
        .map_err(map_tr_err)?;
    if !settled {
        return Err(TidyError::not_found(EntityKind::Job, id.to_string()));
    }
    Ok(())
}

fn exists(conn: &Connection, id: JobId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notification_jobs WHERE id = ?1)",
        params![id.0],
        |row| row.get(0),
    )
}

/// Record a transient failure: reschedule with backoff, or fail once the budget is spent.
///
/// Jobs that are no longer `processing` are left untouched.
pub async fn mark_failed_transient(
    db: &Database,
    id: JobId,
    error: &str,
    now: DateTime<Utc>,
    policy: &RetryPolicy,
) -> Result<JobStatus, TidyError> {
    let error = error.to_string();
    let policy = policy.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<JobStatus, TidyError>> {
            let tx = conn.transaction()?;
            let Some(job) = find(&tx, id)? else {
                return Ok(Err(TidyError::not_found(EntityKind::Job, id.to_string())));
            };
            if job.status != JobStatus::Processing {
                return Ok(Ok(job.status));
            }
            let now_text = codec::ts(now);
            let status = match policy.on_transient_failure(job.attempts, job.max_attempts, now) {
                RetryDecision::Retry {
                    attempts,
                    scheduled_for,
                } => {
                    tx.execute(
                        "UPDATE notification_jobs
                         SET status = 'pending', attempts = ?1, scheduled_for = ?2,
                             last_error = ?3, locked_until = NULL, updated_at = ?4
                         WHERE id = ?5",
                        params![attempts, codec::ts(scheduled_for), error, now_text, id.0],
                    )?;
                    JobStatus::Pending
                }
                RetryDecision::Exhausted => {
                    tx.execute(
                        "UPDATE notification_jobs
                         SET status = 'failed', last_error = ?1, locked_until = NULL,
                             completed_at = ?2, updated_at = ?2
                         WHERE id = ?3",
                        params![error, now_text, id.0],
                    )?;
                    JobStatus::Failed
                }
            };
            tx.commit()?;
            Ok(Ok(status))
        })
        .await
        .map_err(map_tr_err)?
}

/// Record a permanent failure on a `processing` job. Attempts are left unchanged.
pub async fn mark_failed_permanent(
    db: &Database,
    id: JobId,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), TidyError> {
    let error = error.to_string();
    let now = codec::ts(now);
    let settled = db
        .connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let updated = conn.execute(
                "UPDATE notification_jobs
                 SET status = 'failed', last_error = ?1, locked_until = NULL,
                     completed_at = ?2, updated_at = ?2
                 WHERE id = ?3 AND status = 'processing'",
                params![error, now, id.0],
            )?;
            Ok(updated > 0 || exists(conn, id)?)
        })
        .await
        .map_err(map_tr_err)?;
    if !settled {
        return Err(TidyError::not_found(EntityKind::Job, id.to_string()));
    }
    Ok(())
}

/// Return `processing` jobs whose lease expired before `now` to `pending`.
pub async fn reclaim_stale(db: &Database, now: DateTime<Utc>) -> Result<u64, TidyError> {
    let now = codec::ts(now);
    let reclaimed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE notification_jobs
                 SET status = 'pending', locked_until = NULL, updated_at = ?1
                 WHERE status = 'processing'
                   AND (locked_until IS NULL OR locked_until < ?1)",
                params![now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(reclaimed as u64)
}

pub async fn get_job(db: &Database, id: JobId) -> Result<Option<NotificationJob>, TidyError> {
    db.connection()
        .call(move |conn| find(conn, id))
        .await
        .map_err(map_tr_err)
}

/// Jobs matching the filter, newest first.
pub async fn list_jobs(
    db: &Database,
    filter: &JobFilter,
) -> Result<Vec<NotificationJob>, TidyError> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(status) = filter.status {
        values.push(Value::Text(status.to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(channel) = filter.channel {
        values.push(Value::Text(channel.to_string()));
        clauses.push(format!("channel = ?{}", values.len()));
    }
    if let Some(booking_id) = &filter.booking_id {
        values.push(Value::Text(booking_id.0.clone()));
        clauses.push(format!("booking_id = ?{}", values.len()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    values.push(Value::Integer(
        filter
            .limit
            .and_then(|l| i64::try_from(l).ok())
            .unwrap_or(-1),
    ));
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM notification_jobs {where_sql}
         ORDER BY created_at DESC, id DESC LIMIT ?{}",
        values.len()
    );

    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<NotificationJob>> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), job_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Job counts per status.
pub async fn job_stats(db: &Database) -> Result<JobStats, TidyError> {
    let counts = db
        .connection()
        .call(|conn| -> rusqlite::Result<Vec<(JobStatus, u64)>> {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM notification_jobs GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((codec::get_enum(row, 0)?, row.get::<_, i64>(1)? as u64))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    let mut stats = JobStats::default();
    for (status, count) in counts {
        stats.record(status, count);
    }
    Ok(stats)
}
