// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking-to-staff assignments and staff schedules.

use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};
use tidyhq_core::{
    Assignment, BookingId, ScheduledAssignment, StaffId, TidyError, TimeWindow,
};

use crate::codec;
use crate::database::{Database, map_tr_err};

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        booking_id: BookingId(row.get(0)?),
        staff_id: StaffId(row.get(1)?),
        role: codec::get_enum(row, 2)?,
        assigned_at: codec::get_ts(row, 3)?,
    })
}

/// Assignments of one booking, lead first.
pub fn for_booking(conn: &Connection, booking_id: &str) -> rusqlite::Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT booking_id, staff_id, role, assigned_at FROM booking_assignments
         WHERE booking_id = ?1
         ORDER BY CASE role WHEN 'lead' THEN 0 ELSE 1 END, assigned_at ASC, staff_id ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], assignment_from_row)?;
    rows.collect()
}

/// Assignments held by `staff_id` on bookings dated within `[from, to]`.
pub fn schedule(
    conn: &Connection,
    staff_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> rusqlite::Result<Vec<ScheduledAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT a.booking_id, a.staff_id, a.role, a.assigned_at,
                b.scheduled_date, b.start_time, b.duration_minutes, b.status
         FROM booking_assignments a
         JOIN bookings b ON b.booking_id = a.booking_id
         WHERE a.staff_id = ?1 AND b.scheduled_date BETWEEN ?2 AND ?3
         ORDER BY b.scheduled_date ASC, b.start_time ASC",
    )?;
    let rows = stmt.query_map(
        params![staff_id, codec::date(from), codec::date(to)],
        |row| {
            let window = TimeWindow::new(
                codec::get_date(row, 4)?,
                codec::get_time(row, 5)?,
                row.get(6)?,
            );
            Ok(ScheduledAssignment {
                assignment: assignment_from_row(row)?,
                window,
                booking_status: codec::get_enum(row, 7)?,
            })
        },
    )?;
    rows.collect()
}

/// Inserts the assignment, or updates the role when the pair already exists.
pub fn upsert(conn: &Connection, assignment: &Assignment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO booking_assignments (booking_id, staff_id, role, assigned_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(booking_id, staff_id) DO UPDATE SET role = excluded.role",
        params![
            assignment.booking_id.0,
            assignment.staff_id.0,
            assignment.role.to_string(),
            codec::ts(assignment.assigned_at),
        ],
    )?;
    Ok(())
}

/// Deletes one assignment. Returns whether a row was removed.
pub fn remove(conn: &Connection, booking_id: &str, staff_id: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM booking_assignments WHERE booking_id = ?1 AND staff_id = ?2",
        params![booking_id, staff_id],
    )?;
    Ok(removed > 0)
}

pub async fn assignments_for_booking(
    db: &Database,
    booking_id: &BookingId,
) -> Result<Vec<Assignment>, TidyError> {
    let booking_id = booking_id.0.clone();
    db.connection()
        .call(move |conn| for_booking(conn, &booking_id))
        .await
        .map_err(map_tr_err)
}

pub async fn staff_schedule(
    db: &Database,
    staff_id: &StaffId,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ScheduledAssignment>, TidyError> {
    let staff_id = staff_id.0.clone();
    db.connection()
        .call(move |conn| schedule(conn, &staff_id, from, to))
        .await
        .map_err(map_tr_err)
}
