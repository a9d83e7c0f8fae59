// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking lifecycle engine for TidyHQ.
//!
//! - [`lifecycle`] applies status transitions along the fixed booking graph.
//! - [`assignment`] binds staff to bookings without double-booking anyone.
//! - [`notifications`] composes the jobs those changes enqueue.
//! - [`engine`] wraps all of it, plus the dispatcher, behind [`Engine`].

pub mod assignment;
pub mod engine;
pub mod lifecycle;
pub mod notifications;

pub use assignment::{AssignOptions, AssignmentOutcome, AssignmentResolver};
pub use engine::{BookingDetails, Engine, TransitionItem};
pub use lifecycle::{StateMachine, check_transition};
pub use notifications::{Composer, TeamMember};
