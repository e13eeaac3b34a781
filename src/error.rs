//! Error types for the lending ledger

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Stable numeric codes reported to external collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 3,
    NotFound = 5,
    CopyUnavailable = 7,
    ConstraintViolation = 8,
    UserLocked = 11,
    InvalidState = 12,
    RenewalLimitExceeded = 13,
    BadValue = 18,
    ConcurrentModification = 22,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Copy unavailable: {0}")]
    CopyUnavailable(String),

    #[error("User {user_id} is locked until {until}")]
    UserLocked { user_id: i64, until: DateTime<Utc> },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Renewal limit exceeded ({current}/{max})")]
    RenewalLimitExceeded { current: i16, max: i16 },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::CopyUnavailable(_) => ErrorCode::CopyUnavailable,
            AppError::UserLocked { .. } => ErrorCode::UserLocked,
            AppError::InvalidState(_) => ErrorCode::InvalidState,
            AppError::RenewalLimitExceeded { .. } => ErrorCode::RenewalLimitExceeded,
            AppError::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::ConstraintViolation(_) => ErrorCode::ConstraintViolation,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Config(_) | AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    /// Only write-write conflicts are worth retrying as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentModification(_))
    }
}

// PostgreSQL SQLSTATE codes we classify
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return AppError::ConstraintViolation(format!(
                        "duplicate value violates {}",
                        constraint
                    ))
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return AppError::ConstraintViolation(format!(
                        "row is still referenced or reference is missing ({})",
                        constraint
                    ))
                }
                Some(CHECK_VIOLATION) => {
                    return AppError::Validation(format!("value rejected by {}", constraint))
                }
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE) => {
                    return AppError::ConcurrentModification(db.message().to_string())
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
