//! # Error Types
//!
//! Domain-specific error types for sales-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  sales-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule / state machine violations       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  sales-db errors (separate crate)                                      │
//! │  └── DbError          - Store failures, version conflicts              │
//! │                                                                         │
//! │  sales-service errors                                                  │
//! │  └── ServiceError     - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError ← DbError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries enough context (document number, item id, status)
//! for an auditor to tell exactly which rule was violated.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A document or line item cannot be found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The document (or one of its items) is not in a state that allows the
    /// requested operation.
    ///
    /// ## When This Occurs
    /// - Editing items of a confirmed order
    /// - Converting an order that is still a draft
    /// - An item has no remaining quantity to convert
    #[error("{0}")]
    InvalidState(String),

    /// A status transition was requested from a status that does not allow it.
    ///
    /// ## User Workflow
    /// ```text
    /// Invoice INV-240501-3F2A1C (status: paid)
    ///      │
    ///      ▼
    /// cancel()
    ///      │
    ///      ▼
    /// InvalidTransition { action: "cancel", from: "paid", .. }
    ///      │
    ///      ▼
    /// UI shows: "Cannot cancel invoice INV-240501-3F2A1C while it is paid"
    /// ```
    #[error("Cannot {action} {document} {number} while it is {from}")]
    InvalidTransition {
        document: String,
        number: String,
        from: String,
        action: String,
    },

    /// An active derivative already exists and partial mode was not requested.
    #[error("{0}")]
    Conflict(String),

    /// Payment amount is invalid (non-positive or above the open amount).
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidState error with a specific message.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        CoreError::InvalidState(message.into())
    }

    /// Creates an InvalidTransition error.
    pub fn transition(
        document: impl Into<String>,
        number: impl Into<String>,
        from: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidTransition {
            document: document.into(),
            number: number.into(),
            from: from.into(),
            action: action.into(),
        }
    }

    /// Creates an InvalidAmount error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for a missing required field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
