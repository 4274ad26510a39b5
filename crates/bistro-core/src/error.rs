//! # Error Types
//!
//! Domain-specific error types for bistro-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bistro-core errors (this file)                                        │
//! │  ├── CoreError        - Ledger and lifecycle rule violations           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bistro-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  API errors (apps/api)                                                 │
//! │  └── ApiError         - JSON {error, message} seen by clients          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Debits and credits of a journal entry differ.
    ///
    /// ## When This Occurs
    /// - A manual entry submitted with mismatched lines
    /// - A stored entry being posted after its postings were tampered with
    #[error("Journal entry is unbalanced: debits {debit} != credits {credit}")]
    UnbalancedEntry { debit: Money, credit: Money },

    /// A journal entry needs at least two postings.
    #[error("Journal entry needs at least two postings, got {count}")]
    TooFewPostings { count: usize },

    /// A journal entry whose postings sum to zero.
    #[error("Journal entry total must be greater than zero")]
    ZeroEntry,

    /// A single posting line is malformed.
    ///
    /// ## When This Occurs
    /// - Both debit and credit set on the same line
    /// - Neither side set
    /// - A negative amount
    #[error("Invalid posting on line {line} ({account}): {reason}")]
    InvalidPosting {
        line: usize,
        account: String,
        reason: String,
    },

    /// Posted journal entries cannot be changed.
    #[error("Journal entry {entry} is posted and cannot be modified")]
    EntryImmutable { entry: String },

    /// Reparenting would make an account its own ancestor.
    #[error("Account {account} cannot be placed under {parent}: cycle in account tree")]
    AccountCycle { account: i64, parent: i64 },

    /// An order status change that the lifecycle does not allow.
    ///
    /// ## User Workflow
    /// ```text
    /// Table 5: order CLOSED (invoice issued)
    ///      │
    ///      ▼
    /// Waiter taps "mark busy"
    ///      │
    ///      ▼
    /// InvalidOrderTransition { from: "closed", to: "busy" }
    /// ```
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidOrderTransition {
        order_id: i64,
        from: String,
        to: String,
    },

    /// An order that is closed or cancelled was asked to change.
    #[error("Order {order_id} is {status} and can no longer be changed")]
    OrderFinished { order_id: i64, status: String },

    /// An order with no line items cannot be created or invoiced.
    #[error("Order has no line items")]
    EmptyOrder,

    /// Order has exceeded maximum allowed items.
    #[error("Order cannot have more than {max} line items")]
    OrderTooLarge { max: usize },

    /// A record is in a state that does not allow the requested operation.
    #[error("{entity} {id} is {status}, cannot {operation}")]
    InvalidState {
        entity: String,
        id: i64,
        status: String,
        operation: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed account code, bad period).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_allowed(field: &str, allowed: &[&str]) -> Self {
        ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbalanced_message_shows_both_sides() {
        let err = CoreError::UnbalancedEntry {
            debit: Money::from_cents(10000),
            credit: Money::from_cents(9950),
        };
        assert_eq!(
            err.to_string(),
            "Journal entry is unbalanced: debits 100.00 != credits 99.50"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "code".to_string(),
        };
        assert_eq!(err.to_string(), "code is required");

        let err = ValidationError::not_allowed("status", &["draft", "open"]);
        assert_eq!(err.to_string(), "status must be one of: [\"draft\", \"open\"]");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "branch".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
