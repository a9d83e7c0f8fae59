// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured results handed to the console/API layer.
//!
//! Engine operations never leak a raw [`TidyError`] across the caller
//! boundary; they return an [`OperationResult`] carrying either the data or
//! a stable [`ErrorKind`] plus a human-readable message.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TidyError;

/// Stable, serializable error discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    BookingTerminal,
    ScheduleConflict,
    Validation,
    ProviderDeliveryFailure,
    ProviderPermanentFailure,
    StoreFailure,
    Timeout,
    Config,
    Internal,
}

impl ErrorKind {
    /// Validation-class errors are the caller's to fix and are never retried.
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound
                | ErrorKind::InvalidTransition
                | ErrorKind::BookingTerminal
                | ErrorKind::ScheduleConflict
                | ErrorKind::Validation
        )
    }
}

impl TidyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TidyError::Config(_) => ErrorKind::Config,
            TidyError::Storage { .. } => ErrorKind::StoreFailure,
            TidyError::NotFound { .. } => ErrorKind::NotFound,
            TidyError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            TidyError::BookingTerminal { .. } => ErrorKind::BookingTerminal,
            TidyError::ScheduleConflict { .. } => ErrorKind::ScheduleConflict,
            TidyError::Validation(_) => ErrorKind::Validation,
            TidyError::ProviderDelivery { .. } => ErrorKind::ProviderDeliveryFailure,
            TidyError::ProviderPermanent { .. } => ErrorKind::ProviderPermanentFailure,
            TidyError::Timeout { .. } => ErrorKind::Timeout,
            TidyError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Error half of an [`OperationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TidyError> for ErrorBody {
    fn from(err: &TidyError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Success flag plus data, or an error kind and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &TidyError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from(error)),
        }
    }

    /// The error kind, when the operation failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

impl<T> From<Result<T, TidyError>> for OperationResult<T> {
    fn from(result: Result<T, TidyError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}
