//! Error types for the attendance, leave and payroll engine.
//!
//! Every operation of the engine returns [`HrError`]. Each variant belongs to
//! one [`ErrorKind`], which is what callers (and the HTTP boundary) branch on.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an [`HrError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or logically invalid input.
    Validation,
    /// A uniqueness or state invariant would be violated.
    Conflict,
    /// A referenced entity does not exist.
    NotFound,
    /// The caller may not touch the record.
    Forbidden,
    /// The caller could not be identified.
    Unauthorized,
    /// Storage or other infrastructure failure.
    Internal,
}

#[derive(Debug, Error)]
pub enum HrError {
    #[error("Already checked in for today")]
    AlreadyCheckedIn,

    #[error("No check-in record found for today")]
    NoCheckInFound,

    #[error("Already checked out for today")]
    AlreadyCheckedOut,

    #[error("Check-out time must be after check-in time")]
    InvalidTimeOrder,

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: u64 },

    #[error("To date must not be before from date")]
    InvalidDateRange,

    #[error("Leave dates overlap with existing leave request {leave_id}")]
    OverlappingLeave { leave_id: u64 },

    #[error("Leave request not found: {leave_id}")]
    LeaveNotFound { leave_id: u64 },

    #[error("Leave request has already been processed")]
    AlreadyProcessed,

    #[error("Rejection reason is required when rejecting leave")]
    MissingRejectionReason,

    #[error("Only pending leave requests can be cancelled")]
    NotCancellable,

    #[error("Salary record not found: {salary_id}")]
    SalaryNotFound { salary_id: u64 },

    #[error("Invalid month '{month}' for year {year}. Use YYYY-MM")]
    InvalidMonth { month: String, year: i32 },

    #[error("Invalid pagination: {message}")]
    InvalidPagination { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    /// A store-level unique key rejected the write. Services translate this
    /// into the operation-specific conflict.
    #[error("Duplicate record violates {constraint}")]
    Duplicate { constraint: &'static str },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

/// A type alias for Results that return HrError.
pub type HrResult<T> = Result<T, HrError>;

impl HrError {
    pub fn validation(message: impl Into<String>) -> Self {
        HrError::Validation {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HrError::Forbidden {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        HrError::Storage {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HrError::InvalidTimeOrder
            | HrError::InvalidDateRange
            | HrError::InvalidMonth { .. }
            | HrError::InvalidPagination { .. }
            | HrError::Validation { .. } => ErrorKind::Validation,

            HrError::AlreadyCheckedIn
            | HrError::NoCheckInFound
            | HrError::AlreadyCheckedOut
            | HrError::OverlappingLeave { .. }
            | HrError::AlreadyProcessed
            | HrError::MissingRejectionReason
            | HrError::NotCancellable
            | HrError::Duplicate { .. } => ErrorKind::Conflict,

            HrError::UserNotFound { .. }
            | HrError::LeaveNotFound { .. }
            | HrError::SalaryNotFound { .. } => ErrorKind::NotFound,

            HrError::Forbidden { .. } => ErrorKind::Forbidden,
            HrError::Unauthorized { .. } => ErrorKind::Unauthorized,
            HrError::Storage { .. } => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for HrError {
    fn from(e: sqlx::Error) -> Self {
        HrError::Storage {
            message: e.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorKind,
    message: &'a str,
}

impl ResponseError for HrError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = %self, "Request failed");
                "Internal Server Error".to_string()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.kind(),
            message: &message,
        })
    }
}
