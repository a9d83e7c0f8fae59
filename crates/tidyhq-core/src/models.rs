// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain records exchanged with the persistence collaborator.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retry::DEFAULT_MAX_ATTEMPTS;
use crate::schedule::TimeWindow;
use crate::types::{AssignmentRole, BookingId, BookingStatus, Channel, JobId, JobStatus, StaffId};

/// Customer contact details carried on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A scheduled cleaning visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// Storage row id. `None` until the booking has been inserted.
    #[serde(skip)]
    pub row_id: Option<i64>,
    pub customer: Customer,
    pub service_type: String,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub address: String,
    pub status: BookingStatus,
    pub base_price_cents: i64,
    pub extras_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The half-open time window this booking occupies.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.scheduled_date, self.start_time, self.duration_minutes)
    }
}

/// A cleaner who can be assigned to bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    /// Calendar color tag shown in the console.
    pub color: String,
}

/// Binds one staff member to one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub booking_id: BookingId,
    pub staff_id: StaffId,
    pub role: AssignmentRole,
    pub assigned_at: DateTime<Utc>,
}

/// An assignment together with the window and status of its booking.
///
/// Returned by schedule lookups for conflict detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAssignment {
    pub assignment: Assignment,
    pub window: TimeWindow,
    pub booking_status: BookingStatus,
}

/// One entry of a booking's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub booking_id: BookingId,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: String,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// What a notification delivers and to whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Email address or phone number, depending on the channel.
    pub recipient: String,
    #[serde(default)]
    pub subject: Option<String>,
    /// Plain-text body (the whole message for SMS).
    pub message: String,
    #[serde(default)]
    pub html: Option<String>,
    /// Transient file attached to an email; deleted once the job is terminal.
    #[serde(default)]
    pub attachment_path: Option<PathBuf>,
}

impl NotificationPayload {
    /// An SMS or plain email body with no subject.
    pub fn text(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: None,
            message: message.into(),
            html: None,
            attachment_path: None,
        }
    }

    /// An email with subject and text body.
    pub fn email(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::text(recipient, message)
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment_path = Some(path.into());
        self
    }
}

/// A job to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub channel: Channel,
    pub payload: NotificationPayload,
    pub booking_id: Option<BookingId>,
    pub max_attempts: u32,
    /// Earliest delivery time. `None` means due immediately.
    pub not_before: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn new(channel: Channel, payload: NotificationPayload) -> Self {
        Self {
            channel,
            payload,
            booking_id: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            not_before: None,
        }
    }

    pub fn for_booking(mut self, booking_id: BookingId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at);
        self
    }
}

/// A queued notification job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub id: JobId,
    pub channel: Channel,
    pub payload: NotificationPayload,
    pub booking_id: Option<BookingId>,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    /// Lease expiry while `processing`; a job past its lease is reclaimable.
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Filter for the notification log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub channel: Option<Channel>,
    pub booking_id: Option<BookingId>,
    pub limit: Option<usize>,
}

/// Queue counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    pub failed: u64,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Done => self.done += count,
            JobStatus::Failed => self.failed += count,
        }
    }
}

/// Filter for booking listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub date: Option<NaiveDate>,
}
