// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter lifecycle trait.

use async_trait::async_trait;

use crate::error::TidyError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle of a persistence backend.
///
/// Record and queue operations live on [`BookingStore`](crate::BookingStore)
/// and [`JobQueue`](crate::JobQueue); this trait only opens and closes.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), TidyError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), TidyError>;
}
