// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification job dispatcher for the TidyHQ booking engine.
//!
//! Each cycle returns expired claims to the queue, claims a batch of due
//! jobs, delivers them concurrently through the handler registered for their
//! channel, and records the outcome. Several workers may run cycles against
//! the same queue; the atomic claim is their only coordination.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{CycleReport, Dispatcher, DispatcherSettings};
pub use registry::HandlerRegistry;
