//! # Validation Module
//!
//! Input validation utilities for Bistro ERP.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum extractors                                              │
//! │  └── Type validation (JSON / query deserialization)                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules: codes, branches, quantities, periods                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (PostgreSQL)                                        │
//! │  ├── UNIQUE / FOREIGN KEY / CHECK constraints                          │
//! │  └── Trigger rejecting writes to posted journal entries                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bistro_core::validation::{validate_account_code, validate_quantity};
//!
//! validate_account_code("2130").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an account code.
///
/// ## Rules
/// - Must not be empty
/// - Digits only, 1 to 20 characters
///
/// ## Example
/// ```rust
/// use bistro_core::validation::validate_account_code;
///
/// assert!(validate_account_code("1110").is_ok());
/// assert!(validate_account_code("11A0").is_err());
/// ```
pub fn validate_account_code(code: &str) -> ValidationResult<()> {
    required("code", code)?;
    max_len("code", code, 20)?;

    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid("code", "must contain digits only"));
    }

    Ok(())
}

/// Validates a branch code (`china_town`, `main`, ...).
///
/// Lowercase ASCII letters, digits and underscores; at most 50 characters.
/// Branch codes end up in draft storage keys, so anything else is rejected.
pub fn validate_branch(branch: &str) -> ValidationResult<()> {
    required("branch", branch)?;
    max_len("branch", branch, 50)?;

    if !branch
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::invalid(
            "branch",
            "use lowercase letters, digits and underscores",
        ));
    }

    Ok(())
}

/// Validates a table identifier (`5`, `T12`, `terrace-3`).
pub fn validate_table(table: &str) -> ValidationResult<()> {
    required("table", table)?;
    max_len("table", table, 20)?;

    if !table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            "table",
            "use letters, digits, hyphens and underscores",
        ));
    }

    Ok(())
}

/// Validates a display name (account, product, partner, employee).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    required(field, name)?;
    max_len(field, name.trim(), 200)
}

/// Minimal structural email check; the login lookup does the real work.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    required("email", email)?;
    max_len("email", email, 254)?;

    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::invalid("email", "must look like user@example.com")),
    }
}

/// Validates a payroll period in `YYYY-MM` form.
///
/// ## Example
/// ```rust
/// use bistro_core::validation::validate_period;
///
/// assert!(validate_period("2026-03").is_ok());
/// assert!(validate_period("2026-13").is_err());
/// assert!(validate_period("26-03").is_err());
/// ```
pub fn validate_period(period: &str) -> ValidationResult<()> {
    let bad = || ValidationError::invalid("period", "expected YYYY-MM");

    let (year, month) = period.split_once('-').ok_or_else(bad)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(bad());
    }
    let year: u32 = year.parse().map_err(|_| bad())?;
    let month: u32 = month.parse().map_err(|_| bad())?;

    if !(2000..=2999).contains(&year) || !(1..=12).contains(&month) {
        return Err(bad());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an item quantity (1..=999).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a unit price in 0..=MAX_PRICE_CENTS. Zero is allowed
/// (complimentary items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a strictly positive amount (expense amount, salary).
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a non-negative amount (discount, allowances).
pub fn validate_non_negative(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a rate in basis points (0% - 100%).
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates the number of distinct lines on an order.
pub fn validate_order_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 0,
            max: MAX_ORDER_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_account_code() {
        assert!(validate_account_code("1000").is_ok());
        assert!(validate_account_code("2431").is_ok());
        assert!(validate_account_code("").is_err());
        assert!(validate_account_code("  ").is_err());
        assert!(validate_account_code("ABC").is_err());
        assert!(validate_account_code(&"1".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_branch() {
        assert!(validate_branch("china_town").is_ok());
        assert!(validate_branch("main").is_ok());
        assert!(validate_branch("China Town").is_err());
        assert!(validate_branch("").is_err());
    }

    #[test]
    fn test_validate_table() {
        assert!(validate_table("5").is_ok());
        assert!(validate_table("terrace-3").is_ok());
        assert!(validate_table("5/6").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("admin@example.com").is_ok());
        assert!(validate_email("admin").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_period() {
        assert!(validate_period("2026-01").is_ok());
        assert!(validate_period("2026-12").is_ok());
        assert!(validate_period("2026-00").is_err());
        assert!(validate_period("2026-1").is_err());
        assert!(validate_period("garbage").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(2500).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps("vat_rate_bps", 1500).is_ok());
        assert!(validate_rate_bps("vat_rate_bps", 10_001).is_err());
    }
}
