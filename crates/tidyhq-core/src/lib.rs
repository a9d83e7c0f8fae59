// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the TidyHQ booking engine.
//!
//! This crate provides the domain types, error taxonomy, scheduling and retry
//! rules, and the trait seams (stores, notification handlers) shared by every
//! other crate in the workspace.

pub mod changes;
pub mod clock;
pub mod error;
pub mod models;
pub mod outcome;
pub mod retry;
pub mod schedule;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use changes::{ChangeSet, CommitReceipt, ScheduleGuard, StatusChange};
pub use clock::{Clock, SystemClock};
pub use error::TidyError;
pub use models::{
    Assignment, Booking, BookingFilter, Customer, JobFilter, JobStats, NewJob, NotificationJob,
    NotificationPayload, ScheduledAssignment, Staff, StatusRecord,
};
pub use outcome::{ErrorBody, ErrorKind, OperationResult};
pub use retry::{RetryDecision, RetryPolicy};
pub use schedule::{MAX_BOOKING_MINUTES, TimeWindow, find_conflict, validate_duration};
pub use types::{
    AdapterType, AssignmentRole, BookingId, BookingStatus, Channel, EntityKind, HealthStatus,
    JobId, JobStatus, StaffId,
};

pub use traits::{
    BookingStore, DeliveryReceipt, JobQueue, NotificationHandler, PluginAdapter, StorageAdapter,
    Store,
};
