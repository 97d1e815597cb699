//! # Error Types
//!
//! Domain-specific error types for tillbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tillbook-core errors (this file)                                       │
//! │  ├── PosError         - Operation-level failure taxonomy                │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  tillbook-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  Flow: ValidationError → PosError ← DbError                             │
//! │                                                                         │
//! │  Every public workflow operation returns Result<T, PosError>; no        │
//! │  panic or raw sqlx error crosses that boundary, and a failed operation  │
//! │  rolls back its whole transaction before returning.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, id, amounts)
//! 3. Errors are enum variants, never bool+string tuples

use thiserror::Error;

// =============================================================================
// Operation Error
// =============================================================================

/// Failure taxonomy for every public workflow operation.
///
/// The `Display` output is the user-visible message; callers surface it
/// directly in a dialog.
#[derive(Debug, Error)]
pub enum PosError {
    /// Referenced user/product/order/reversal does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Workflow transition attempted out of order
    /// (e.g. posting a reversal that was never authorized).
    #[error("{0}")]
    InvalidState(String),

    /// A guarded stock decrement found fewer units than requested.
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// Non-positive or over-balance payment, refund, or adjustment.
    #[error("{0}")]
    InvalidAmount(String),

    /// Malformed input or an unbalanced journal line set.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Catch-all persistence failure; the message names the step that
    /// failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl PosError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        PosError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidState error with a user-facing message.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        PosError::InvalidState(message.into())
    }

    /// Creates an InvalidAmount error with a user-facing message.
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        PosError::InvalidAmount(message.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the [`crate::validation`] checks before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. bad product code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A cart or line set with no lines in it.
    #[error("{context} must contain at least one line")]
    Empty { context: String },

    /// The same product appears on more than one line of a cart.
    #[error("{product_code} appears on more than one line")]
    DuplicateLine { product_code: String },

    /// Journal debits and credits do not sum equal.
    #[error("journal entry for {reference} is unbalanced: debits {debits} != credits {credits}")]
    UnbalancedEntry {
        reference: String,
        debits: i64,
        credits: i64,
    },

    /// A journal line names an account with no metadata and no existing row.
    #[error("no account metadata supplied for {account}")]
    UnknownAccount { account: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with PosError.
pub type PosResult<T> = Result<T, PosError>;

// =============================================================================
// Unit Tests
// =============================================================================
