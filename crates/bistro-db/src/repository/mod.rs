//! # Repository Module
//!
//! Database repository implementations for Bistro ERP.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler                                                          │
//! │       │                                                                 │
//! │       │  db.orders().save_draft(input)                                 │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── BEGIN                                                             │
//! │  ├── bistro-core rules (normalize_items, ensure_transition, ...)       │
//! │  ├── SQL via query_as::<_, *Record>                                    │
//! │  └── COMMIT (or drop → ROLLBACK)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PostgreSQL                                                            │
//! │                                                                         │
//! │  Cross-aggregate writes (invoice + journal entry) share one            │
//! │  transaction through `pub(crate)` helpers taking `&mut PgConnection`.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`AccountRepository`](account::AccountRepository) - Chart of accounts, provisioning
//! - [`BranchRepository`](branch::BranchRepository) - Branches
//! - [`JournalRepository`](journal::JournalRepository) - Entries and postings
//! - [`ProductRepository`](product::ProductRepository) - Menu items
//! - [`OrderRepository`](order::OrderRepository) - POS drafts, status, invoicing
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Issued invoices
//! - [`ExpenseRepository`](expense::ExpenseRepository) - Expenses and posting
//! - [`PartnerRepository`](partner::PartnerRepository) - Customers and suppliers
//! - [`EmployeeRepository`](employee::EmployeeRepository) - Staff
//! - [`PayrollRepository`](payroll::PayrollRepository) - Runs, accrual, payment
//! - [`UserRepository`](user::UserRepository) - Users, passwords, permissions
//! - [`SettingsRepository`](settings::SettingsRepository) - Key/value settings
//! - [`ReportRepository`](report::ReportRepository) - Ledger reports

use std::str::FromStr;

use bistro_core::ValidationError;

use crate::error::{DbError, DbResult};

pub mod account;
pub mod branch;
pub mod employee;
pub mod expense;
pub mod invoice;
pub mod journal;
pub mod order;
pub mod partner;
pub mod payroll;
pub mod product;
pub mod report;
pub mod settings;
pub mod user;

/// Default page size for list queries.
pub const DEFAULT_LIMIT: i64 = 100;

/// Upper bound on any list query.
pub const MAX_LIMIT: i64 = 1000;

/// Clamps a client-provided limit.
pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Parses a TEXT column into a core enum.
///
/// CHECK constraints keep these columns valid, so a failure means the row
/// was written outside the application.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> DbResult<T>
where
    T: FromStr<Err = ValidationError>,
{
    value
        .parse()
        .map_err(|_| DbError::Internal(format!("unexpected {} value '{}'", column, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bistro_core::OrderStatus;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(5000)), MAX_LIMIT);
    }

    #[test]
    fn test_parse_column() {
        let status: OrderStatus = parse_column("status", "busy").unwrap();
        assert_eq!(status, OrderStatus::Busy);
        assert!(parse_column::<OrderStatus>("status", "lost").is_err());
    }
}
