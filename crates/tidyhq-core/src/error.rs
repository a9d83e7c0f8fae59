// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the TidyHQ booking engine.

use thiserror::Error;

use crate::types::{BookingId, BookingStatus, EntityKind, StaffId};

/// The primary error type used across the engine, its stores, and its handlers.
#[derive(Debug, Error)]
pub enum TidyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence collaborator errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A referenced record does not exist.
    #[error("{entity} `{id}` not found")]
    NotFound { entity: EntityKind, id: String },

    /// The requested status is not reachable from the booking's current status.
    #[error("booking {booking_id} cannot move from {from} to {to}")]
    InvalidTransition {
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    /// The booking is completed or cancelled and can no longer be staffed.
    #[error("booking {booking_id} is {status} and can no longer be changed")]
    BookingTerminal {
        booking_id: BookingId,
        status: BookingStatus,
    },

    /// The staff member already holds an overlapping assignment.
    #[error(
        "staff member {staff_id} is already booked at that time (booking {conflicting_booking})"
    )]
    ScheduleConflict {
        staff_id: StaffId,
        booking_id: BookingId,
        conflicting_booking: BookingId,
    },

    /// Caller input rejected before touching any record.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transient delivery failure reported by an email/SMS provider. Retried with backoff.
    #[error("delivery failed: {message}")]
    ProviderDelivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Permanent delivery failure (invalid recipient, rejected content). Never retried.
    #[error("delivery rejected permanently: {message}")]
    ProviderPermanent { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TidyError {
    /// Shorthand for a [`TidyError::NotFound`].
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wraps any error as a [`TidyError::Storage`].
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Shorthand for a transient [`TidyError::ProviderDelivery`] without a source.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::ProviderDelivery {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`TidyError::ProviderPermanent`].
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::ProviderPermanent {
            message: message.into(),
        }
    }

    /// Returns true when retrying the same delivery can never succeed.
    pub fn is_permanent_delivery_failure(&self) -> bool {
        matches!(self, Self::ProviderPermanent { .. })
    }
}
