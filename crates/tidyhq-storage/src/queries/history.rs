// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking status history.

use rusqlite::{Connection, params};
use tidyhq_core::{BookingId, StatusRecord, TidyError};

use crate::codec;
use crate::database::{Database, map_tr_err};

pub fn insert(conn: &Connection, record: &StatusRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO booking_status_history
             (booking_id, from_status, to_status, actor, reason, changed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.booking_id.0,
            record.from.to_string(),
            record.to.to_string(),
            record.actor,
            record.reason,
            codec::ts(record.at),
        ],
    )?;
    Ok(())
}

/// Status history of a booking, oldest first.
pub async fn status_history(
    db: &Database,
    booking_id: &BookingId,
) -> Result<Vec<StatusRecord>, TidyError> {
    let booking_id = booking_id.0.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<StatusRecord>> {
            let mut stmt = conn.prepare(
                "SELECT booking_id, from_status, to_status, actor, reason, changed_at
                 FROM booking_status_history WHERE booking_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![booking_id], |row| {
                Ok(StatusRecord {
                    booking_id: BookingId(row.get(0)?),
                    from: codec::get_enum(row, 1)?,
                    to: codec::get_enum(row, 2)?,
                    actor: row.get(3)?,
                    reason: row.get(4)?,
                    at: codec::get_ts(row, 5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
