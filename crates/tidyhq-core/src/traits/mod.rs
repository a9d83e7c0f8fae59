// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams of the engine.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility. The persistence collaborator is split
//! into [`BookingStore`] (records) and [`JobQueue`] (the notification queue).

pub mod adapter;
pub mod handler;
pub mod storage;
pub mod store;

pub use adapter::PluginAdapter;
pub use handler::{DeliveryReceipt, NotificationHandler};
pub use storage::StorageAdapter;
pub use store::{BookingStore, JobQueue, Store};
