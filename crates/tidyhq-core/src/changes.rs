// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic change sets.
//!
//! A single transition or assignment call produces exactly one [`ChangeSet`].
//! Stores apply it in one transaction: either the booking/assignment mutation
//! and every enqueued job land together, or nothing does.

use crate::models::{Assignment, NewJob};
use crate::schedule::TimeWindow;
use crate::types::{BookingId, BookingStatus, JobId, StaffId};

/// A booking status update, conditional on the status the caller read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub booking_id: BookingId,
    /// Expected current status. A mismatch aborts the change set.
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: String,
    pub reason: Option<String>,
}

/// Re-check, inside the transaction, that `staff_id` is still free for `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleGuard {
    pub staff_id: StaffId,
    pub booking_id: BookingId,
    pub window: TimeWindow,
}

/// Everything one engine call writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub status: Option<StatusChange>,
    pub guards: Vec<ScheduleGuard>,
    /// Inserted, or updated in place when the (booking, staff) pair exists.
    pub upserts: Vec<Assignment>,
    pub removals: Vec<(BookingId, StaffId)>,
    pub jobs: Vec<NewJob>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.guards.is_empty()
            && self.upserts.is_empty()
            && self.removals.is_empty()
            && self.jobs.is_empty()
    }
}

/// Result of a committed change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Ids of the enqueued jobs, in change-set order.
    pub job_ids: Vec<JobId>,
}
