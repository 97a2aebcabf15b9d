//! # Service Error Type
//!
//! One error type for every service operation, with a machine-readable code.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Service Layer                      │
//! │                                                                         │
//! │  CoreError (sales-core)          DbError (sales-db)                     │
//! │  NotFound / InvalidState /       NotFound / VersionConflict /           │
//! │  InvalidTransition / Conflict /  Duplicate / QueryFailed / ...          │
//! │  InvalidAmount / Validation                                            │
//! │          │                               │                              │
//! │          └───────────────┬───────────────┘                              │
//! │                          ▼                                              │
//! │                   ServiceError ──► code() ──► ErrorBody { code, message }│
//! │                                                                         │
//! │  try {                                                                  │
//! │    await convertOrderToDelivery(...)                                    │
//! │  } catch (e) {                                                          │
//! │    // e.code    = "CONFLICT"                                            │
//! │    // e.message = "Order SO-240501-3F2A1C already has an active ..."    │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use sales_core::{CoreError, ValidationError};
use sales_db::DbError;

/// Errors returned by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Document or line item does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Operation not allowed in the current state.
    ///
    /// ## When This Occurs
    /// - Editing a document that left its initial status
    /// - Converting a source whose status does not allow it
    /// - Cancelling a document that still has live derivatives
    #[error("{0}")]
    InvalidState(String),

    /// Status transition not allowed from the current status.
    #[error("{0}")]
    InvalidTransition(String),

    /// An active derivative exists and partial mode was not requested.
    #[error("{0}")]
    Conflict(String),

    /// The document changed since the caller (or this service) loaded it.
    #[error(
        "{entity} {id} was modified concurrently \
         (expected version {expected}, found {actual})"
    )]
    VersionConflict {
        entity: String,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Payment amount rejected.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Input validation failed.
    #[error(transparent)]
    Validation(ValidationError),

    /// Storage failure not covered above.
    #[error("Database error: {0}")]
    Database(#[source] DbError),
}

/// Error codes for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidState,
    InvalidTransition,
    Conflict,
    VersionConflict,
    InvalidAmount,
    ValidationError,
    DatabaseError,
}

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ServiceError::InvalidState(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }

    /// Machine-readable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::NotFound { .. } => ErrorCode::NotFound,
            ServiceError::InvalidState(_) => ErrorCode::InvalidState,
            ServiceError::InvalidTransition(_) => ErrorCode::InvalidTransition,
            ServiceError::Conflict(_) => ErrorCode::Conflict,
            ServiceError::VersionConflict { .. } => ErrorCode::VersionConflict,
            ServiceError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            ServiceError::Validation(_) => ErrorCode::ValidationError,
            ServiceError::Database(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            CoreError::InvalidState(message) => ServiceError::InvalidState(message),
            err @ CoreError::InvalidTransition { .. } => {
                ServiceError::InvalidTransition(err.to_string())
            }
            CoreError::Conflict(message) => ServiceError::Conflict(message),
            CoreError::InvalidAmount { reason } => ServiceError::InvalidAmount(reason),
            CoreError::Validation(e) => ServiceError::Validation(e),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err)
    }
}

/// Converts repository errors.
///
/// A clashing id or number surfaces as `Conflict`; connection and query
/// failures stay `Database`.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DbError::VersionConflict {
                entity,
                id,
                expected,
                actual,
            } => ServiceError::VersionConflict {
                entity,
                id,
                expected,
                actual,
            },
            DbError::Duplicate { field, value } => {
                ServiceError::Conflict(format!("Duplicate {}: '{}' already exists", field, value))
            }
            other => ServiceError::Database(other),
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Serializable Body
// =============================================================================

/// What a caller receives when an operation fails.
///
/// ```json
/// {
///   "code": "INVALID_TRANSITION",
///   "message": "Cannot cancel invoice INV-240501-3F2A1C while it is PAID"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        let message = match err {
            // Log the actual error but return a generic message
            ServiceError::Database(e) => {
                tracing::error!("Database operation failed: {}", e);
                "Database operation failed".to_string()
            }
            other => other.to_string(),
        };

        ErrorBody {
            code: err.code(),
            message,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
