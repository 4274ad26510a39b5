//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  PostgreSQL error (sqlx::Error)        CoreError (ledger rules)        │
//! │       │                                      │                          │
//! │       ▼                                      ▼                          │
//! │  DbError (this module) ← SQLSTATE mapped, domain errors wrapped        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (apps/api) ← {error, message} JSON                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SQLSTATE Mapping
//! | Code    | Meaning                         | DbError                   |
//! |---------|---------------------------------|---------------------------|
//! | `23505` | unique_violation                | `UniqueViolation`         |
//! | `23503` | foreign_key_violation           | `ForeignKeyViolation`     |
//! | `23514` | check_violation                 | `ConstraintViolation`     |
//! | `BX001` | posted entry modified (trigger) | `Domain(EntryImmutable)`  |
//! | `BX002` | unbalanced on commit (trigger)  | `ConstraintViolation`     |

use bistro_core::CoreError;
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and business rule violations raised while
/// a repository holds a transaction.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_optional` returned no row for an id
    /// - A posting names an account code that was never provisioned
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate account code, employee number or email
    /// - A second active order for the same table
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint or ledger trigger violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Server unreachable or credentials rejected
    /// - TLS negotiation failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl From<bistro_core::ValidationError> for DbError {
    fn from(err: bistro_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → SQLSTATE table above
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io / Tls       → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();

                match db_err.code().as_deref() {
                    Some("23505") => DbError::UniqueViolation {
                        field: constraint,
                        value: db_err
                            .try_downcast_ref::<PgDatabaseError>()
                            .and_then(PgDatabaseError::detail)
                            .and_then(duplicate_key_value)
                            .unwrap_or_else(|| "unknown".to_string()),
                    },
                    Some("23503") => DbError::ForeignKeyViolation { message: msg },
                    Some("23514") | Some("BX002") => DbError::ConstraintViolation(msg),
                    Some("BX001") => DbError::Domain(CoreError::EntryImmutable { entry: msg }),
                    _ => DbError::QueryFailed(msg),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::Tls(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// `Key (code)=(1110) already exists.` → `1110`
fn duplicate_key_value(detail: &str) -> Option<String> {
    let (_, rest) = detail.split_once(")=(")?;
    let (value, _) = rest.rsplit_once(')')?;
    Some(value.to_string())
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
    }

    #[test]
    fn test_domain_errors_pass_through_transparently() {
        let err: DbError = CoreError::EmptyOrder.into();
        assert_eq!(err.to_string(), "Order has no line items");
    }

    #[test]
    fn test_duplicate_key_value_from_detail() {
        assert_eq!(
            duplicate_key_value("Key (code)=(1110) already exists.").as_deref(),
            Some("1110")
        );
        assert_eq!(
            duplicate_key_value("Key (lower(email))=(a@b.c) already exists.").as_deref(),
            Some("a@b.c")
        );
        assert_eq!(duplicate_key_value("no detail"), None);
    }

    #[test]
    fn test_not_found_helper() {
        let err = DbError::not_found("Account", 2130);
        assert_eq!(err.to_string(), "Account not found: 2130");
    }
}
