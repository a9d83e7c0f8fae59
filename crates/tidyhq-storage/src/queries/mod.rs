// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for storage entities.
//!
//! Each module exposes synchronous functions over a `rusqlite::Connection`
//! (so change sets can compose them inside one transaction) and async
//! wrappers that run them on the [`Database`](crate::Database) writer thread.

pub mod assignments;
pub mod bookings;
pub mod changes;
pub mod history;
pub mod jobs;
pub mod staff;
