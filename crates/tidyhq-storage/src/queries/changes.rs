// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic application of a [`ChangeSet`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tidyhq_core::{
    AssignmentRole, BookingId, BookingStatus, ChangeSet, CommitReceipt, EntityKind, StatusRecord,
    TidyError, find_conflict,
};
use tracing::debug;

use crate::codec;
use crate::database::{Database, map_tr_err};
use crate::queries::{assignments, bookings, history, jobs};

/// Apply every part of the change set in one transaction.
pub async fn commit(
    db: &Database,
    changes: ChangeSet,
    now: DateTime<Utc>,
) -> Result<CommitReceipt, TidyError> {
    if changes.is_empty() {
        return Ok(CommitReceipt::default());
    }
    let receipt = db
        .connection()
        .call(move |conn| apply(conn, changes, now))
        .await
        .map_err(map_tr_err)??;
    debug!(jobs = receipt.job_ids.len(), "change set committed");
    Ok(receipt)
}

fn current_status(conn: &Connection, id: &BookingId) -> rusqlite::Result<Option<BookingStatus>> {
    bookings::find_status(conn, &id.0)?
        .map(|raw| {
            raw.parse::<BookingStatus>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })
        })
        .transpose()
}

/// Runs the change set inside a transaction; an inner `Err` rolls everything back.
fn apply(
    conn: &mut Connection,
    mut changes: ChangeSet,
    now: DateTime<Utc>,
) -> rusqlite::Result<Result<CommitReceipt, TidyError>> {
    let tx = conn.transaction()?;
    let now_text = codec::ts(now);

    if let Some(change) = &changes.status {
        let current = match current_status(&tx, &change.booking_id)? {
            Some(status) => status,
            None => {
                return Ok(Err(TidyError::not_found(
                    EntityKind::Booking,
                    change.booking_id.0.clone(),
                )));
            }
        };
        if current != change.from || !current.can_transition_to(change.to) {
            return Ok(Err(TidyError::InvalidTransition {
                booking_id: change.booking_id.clone(),
                from: current,
                to: change.to,
            }));
        }
        let cancellation_reason = match change.to {
            BookingStatus::Cancelled => change.reason.clone(),
            _ => None,
        };
        tx.execute(
            "UPDATE bookings
             SET status = ?1, updated_at = ?2,
                 cancellation_reason = COALESCE(?3, cancellation_reason)
             WHERE booking_id = ?4",
            params![
                change.to.to_string(),
                now_text,
                cancellation_reason,
                change.booking_id.0
            ],
        )?;
        history::insert(
            &tx,
            &StatusRecord {
                booking_id: change.booking_id.clone(),
                from: current,
                to: change.to,
                actor: change.actor.clone(),
                reason: change.reason.clone(),
                at: now,
            },
        )?;
    }

    // Bookings moved by this change set were checked above.
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
        match current_status(&tx, booking_id)? {
            Some(status) if status.is_terminal() => {
                return Ok(Err(TidyError::BookingTerminal {
                    booking_id: booking_id.clone(),
                    status,
                }));
            }
            Some(_) => {}
            None => {
                return Ok(Err(TidyError::not_found(
                    EntityKind::Booking,
                    booking_id.0.clone(),
                )));
            }
        }
    }

    for guard in &changes.guards {
        let (from, to) = guard.window.lookup_dates();
        let existing = assignments::schedule(&tx, &guard.staff_id.0, from, to)?;
        if let Some(hit) = find_conflict(&guard.booking_id, &guard.window, &existing) {
            return Ok(Err(TidyError::ScheduleConflict {
                staff_id: guard.staff_id.clone(),
                booking_id: guard.booking_id.clone(),
                conflicting_booking: hit.assignment.booking_id.clone(),
            }));
        }
    }

    for (booking_id, staff_id) in &changes.removals {
        if !assignments::remove(&tx, &booking_id.0, &staff_id.0)? {
            return Ok(Err(TidyError::not_found(
                EntityKind::Assignment,
                format!("{booking_id}/{staff_id}"),
            )));
        }
    }

    // Demotions must land before the new lead or the one-lead index rejects it.
    changes
        .upserts
        .sort_by_key(|a| matches!(a.role, AssignmentRole::Lead));
    let mut touched = Vec::new();
    for assignment in &changes.upserts {
        assignments::upsert(&tx, assignment)?;
        if !touched.contains(&assignment.booking_id) {
            touched.push(assignment.booking_id.clone());
        }
    }
    for (booking_id, _) in &changes.removals {
        if !touched.contains(booking_id) {
            touched.push(booking_id.clone());
        }
    }
    for booking_id in &touched {
        tx.execute(
            "UPDATE bookings SET updated_at = ?1 WHERE booking_id = ?2",
            params![now_text, booking_id.0],
        )?;
    }

    let mut job_ids = Vec::with_capacity(changes.jobs.len());
    for job in &changes.jobs {
        job_ids.push(jobs::insert(&tx, job, now)?);
    }

    tx.commit()?;
    Ok(Ok(CommitReceipt { job_ids }))
}
