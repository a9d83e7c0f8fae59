// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record fixtures. All bookings start `pending` and default to a customer
//! with both an email address and a phone number.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tidyhq_core::{
    Booking, BookingId, BookingStatus, Channel, Customer, NewJob, NotificationPayload, Staff,
    StaffId,
};

/// Reference instant: 2026-05-01 08:00:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Parses `YYYY-MM-DD`. Panics on malformed fixture input.
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("bad fixture date {s}: {e}"))
}

/// Parses `HH:MM`. Panics on malformed fixture input.
pub fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M")
        .unwrap_or_else(|e| panic!("bad fixture time {s}: {e}"))
}

pub fn customer() -> Customer {
    Customer {
        id: "C1".into(),
        name: "Dana Reyes".into(),
        email: Some("dana@example.com".into()),
        phone: Some("+15550100100".into()),
    }
}

/// A pending booking on `day` starting at `start` (`HH:MM`).
pub fn booking(id: &str, day: &str, start: &str, duration_minutes: u32) -> Booking {
    Booking {
        id: BookingId(id.into()),
        row_id: None,
        customer: customer(),
        service_type: "standard".into(),
        scheduled_date: date(day),
        start_time: time(start),
        duration_minutes,
        address: "12 Elm St, Springfield".into(),
        status: BookingStatus::Pending,
        base_price_cents: 12_000,
        extras_cents: 0,
        total_cents: 12_000,
        notes: None,
        cancellation_reason: None,
        created_at: t0(),
        updated_at: t0(),
    }
}

/// An active staff member with email and phone.
pub fn staff(id: &str, name: &str) -> Staff {
    Staff {
        id: StaffId(id.into()),
        name: name.into(),
        email: Some(format!("{}@crew.example.com", id.to_lowercase())),
        phone: Some("+15550100200".into()),
        active: true,
        color: "#3b82f6".into(),
    }
}

pub fn email_job(recipient: &str) -> NewJob {
    NewJob::new(
        Channel::Email,
        NotificationPayload::email(recipient, "Booking update", "Hello"),
    )
}

pub fn sms_job(phone: &str) -> NewJob {
    NewJob::new(Channel::Sms, NotificationPayload::text(phone, "Hello"))
}
