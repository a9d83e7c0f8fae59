// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for TidyHQ integration tests.
//!
//! Provides fakes and fixtures for fast, deterministic, CI-runnable tests
//! without a database file, an SMTP relay, or an SMS gateway.
//!
//! # Components
//!
//! - [`InMemoryStore`] - `BookingStore` + `JobQueue` fake applying change sets under one mutex
//! - [`MockHandler`] - Notification handler with scripted outcomes and captured deliveries
//! - [`ManualClock`] - Clock that only moves when told to
//! - [`contract`] - Behavioural checks every store implementation must pass

pub mod clock;
pub mod contract;
pub mod fixtures;
pub mod memory_store;
pub mod mock_handler;

pub use clock::ManualClock;
pub use memory_store::InMemoryStore;
pub use mock_handler::{MockHandler, Scripted};
