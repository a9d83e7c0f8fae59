// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking CRUD operations.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tidyhq_core::{Booking, BookingFilter, BookingId, Customer, TidyError, validate_duration};

use crate::codec;
use crate::database::{Database, map_tr_err};

const BOOKING_COLUMNS: &str = "id, booking_id, customer_id, customer_name, customer_email, \
     customer_phone, service_type, scheduled_date, start_time, duration_minutes, address, \
     status, base_price_cents, extras_cents, total_cents, notes, cancellation_reason, \
     created_at, updated_at";

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        row_id: Some(row.get(0)?),
        id: BookingId(row.get(1)?),
        customer: Customer {
            id: row.get(2)?,
            name: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
        },
        service_type: row.get(6)?,
        scheduled_date: codec::get_date(row, 7)?,
        start_time: codec::get_time(row, 8)?,
        duration_minutes: row.get(9)?,
        address: row.get(10)?,
        status: codec::get_enum(row, 11)?,
        base_price_cents: row.get(12)?,
        extras_cents: row.get(13)?,
        total_cents: row.get(14)?,
        notes: row.get(15)?,
        cancellation_reason: row.get(16)?,
        created_at: codec::get_ts(row, 17)?,
        updated_at: codec::get_ts(row, 18)?,
    })
}

/// Fetches one booking by its external id.
pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = ?1"),
        params![id],
        booking_from_row,
    )
    .optional()
}

/// Current status of a booking, without loading the whole record.
pub fn find_status(conn: &Connection, id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT status FROM bookings WHERE booking_id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
}

/// Insert a new booking. Fails with `Validation` when the id is already taken.
pub async fn insert_booking(db: &Database, booking: &Booking) -> Result<(), TidyError> {
    validate_duration(&booking.id, booking.duration_minutes)?;
    let booking = booking.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Result<(), TidyError>> {
            if find_status(conn, &booking.id.0)?.is_some() {
                return Ok(Err(TidyError::Validation(format!(
                    "booking {} already exists",
                    booking.id
                ))));
            }
            conn.execute(
                "INSERT INTO bookings (booking_id, customer_id, customer_name, customer_email,
                     customer_phone, service_type, scheduled_date, start_time, duration_minutes,
                     address, status, base_price_cents, extras_cents, total_cents, notes,
                     cancellation_reason, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18)",
                params![
                    booking.id.0,
                    booking.customer.id,
                    booking.customer.name,
                    booking.customer.email,
                    booking.customer.phone,
                    booking.service_type,
                    codec::date(booking.scheduled_date),
                    codec::time(booking.start_time),
                    booking.duration_minutes,
                    booking.address,
                    booking.status.to_string(),
                    booking.base_price_cents,
                    booking.extras_cents,
                    booking.total_cents,
                    booking.notes,
                    booking.cancellation_reason,
                    codec::ts(booking.created_at),
                    codec::ts(booking.updated_at),
                ],
            )?;
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

/// Get a booking by its external id.
pub async fn get_booking(db: &Database, id: &BookingId) -> Result<Option<Booking>, TidyError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| find(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// List bookings ordered by date and start time, optionally filtered.
pub async fn list_bookings(
    db: &Database,
    filter: &BookingFilter,
) -> Result<Vec<Booking>, TidyError> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(status) = filter.status {
        values.push(Value::Text(status.to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(date) = filter.date {
        values.push(Value::Text(codec::date(date)));
        clauses.push(format!("scheduled_date = ?{}", values.len()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_sql}
         ORDER BY scheduled_date ASC, start_time ASC, booking_id ASC"
    );

    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Booking>> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), booking_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tidyhq_core::BookingStatus;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn booking(id: &str, day: u32, hour: u32) -> Booking {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        Booking {
            id: BookingId(id.into()),
            row_id: None,
            customer: Customer {
                id: "C1".into(),
                name: "Dana Reyes".into(),
                email: Some("dana@example.com".into()),
                phone: None,
            },
            service_type: "standard".into(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 5, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            duration_minutes: 120,
            address: "12 Elm St".into(),
            status: BookingStatus::Pending,
            base_price_cents: 12_000,
            extras_cents: 1_500,
            total_cents: 13_500,
            notes: None,
            cancellation_reason: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trips_fields() {
        let (db, _dir) = setup_db().await;
        let b = booking("B1", 2, 9);
        insert_booking(&db, &b).await.unwrap();

        let stored = get_booking(&db, &b.id).await.unwrap().unwrap();
        assert!(stored.row_id.is_some());
        assert_eq!(Booking { row_id: None, ..stored }, b);

        assert!(get_booking(&db, &"B404".into()).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_and_zero_duration_are_rejected() {
        let (db, _dir) = setup_db().await;
        insert_booking(&db, &booking("B1", 2, 9)).await.unwrap();
        let dup = insert_booking(&db, &booking("B1", 3, 9)).await.unwrap_err();
        assert!(matches!(dup, TidyError::Validation(_)), "{dup}");

        let mut zero = booking("B2", 2, 9);
        zero.duration_minutes = 0;
        let err = insert_booking(&db, &zero).await.unwrap_err();
        assert!(matches!(err, TidyError::Validation(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_orders_by_schedule_and_filters() {
        let (db, _dir) = setup_db().await;
        insert_booking(&db, &booking("B3", 3, 8)).await.unwrap();
        insert_booking(&db, &booking("B2", 2, 14)).await.unwrap();
        insert_booking(&db, &booking("B1", 2, 9)).await.unwrap();

        let all = list_bookings(&db, &BookingFilter::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|b| b.id.0.as_str()).collect();
        assert_eq!(ids, ["B1", "B2", "B3"]);

        let filter = BookingFilter {
            date: NaiveDate::from_ymd_opt(2026, 5, 3),
            ..Default::default()
        };
        assert_eq!(list_bookings(&db, &filter).await.unwrap().len(), 1);

        let filter = BookingFilter {
            status: Some(BookingStatus::Confirmed),
            ..Default::default()
        };
        assert!(list_bookings(&db, &filter).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
