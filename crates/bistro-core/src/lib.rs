//! # bistro-core: Pure Business Logic for Bistro ERP
//!
//! This crate is the **heart** of Bistro ERP. It contains the ledger rules,
//! the POS draft-order lifecycle and the permission model as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bistro ERP Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web frontend (out of tree)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ REST / JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum handlers)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bistro-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ ┌─────────┐  │   │
//! │  │   │ journal │ │  chart  │ │ postings │ │ order  │ │ perms   │  │   │
//! │  │   │ balance │ │  tree   │ │ invoice  │ │ states │ │ admin   │  │   │
//! │  │   │ drafts  │ │ cycles  │ │ payroll  │ │ items  │ │ bypass  │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └────────┘ └─────────┘  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bistro-db (PostgreSQL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Account, JournalEntry, Order, Invoice, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation
//! - [`journal`] - Journal drafts and the double-entry balance check
//! - [`chart`] - Chart of accounts: required accounts, tree, cycle detection
//! - [`postings`] - Journal generation for invoices, expenses and payroll
//! - [`order`] - POS draft-order lifecycle and line-item normalisation
//! - [`permissions`] - Screen/branch/action permission evaluation
//! - [`report`] - Trial balance, statements, VAT and sales summaries
//!
//! ## Example Usage
//!
//! ```rust
//! use bistro_core::journal::JournalDraft;
//! use bistro_core::money::Money;
//! use bistro_core::types::EntryReference;
//!
//! let draft = JournalDraft::new("Cash sale", EntryReference::Manual)
//!     .debit("1110", Money::from_cents(11500))
//!     .credit("4100", Money::from_cents(10000))
//!     .credit("2110", Money::from_cents(1500));
//!
//! assert!(draft.validate().is_ok());
//! ```

pub mod chart;
pub mod error;
pub mod journal;
pub mod money;
pub mod order;
pub mod permissions;
pub mod postings;
pub mod report;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Branch code used when a user or record carries no explicit branch.
pub const DEFAULT_BRANCH: &str = "main";

/// Maximum distinct line items on a single POS order.
pub const MAX_ORDER_ITEMS: usize = 200;

/// Maximum quantity of a single line item.
///
/// Guards against typing 1000 instead of 10 on a touch keypad.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum unit price in cents (1,000,000.00).
///
/// With [`MAX_ITEM_QUANTITY`] and [`MAX_ORDER_ITEMS`] this keeps the largest
/// possible order total far inside `i64` cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Default Saudi VAT rate in basis points (15%).
pub const DEFAULT_VAT_RATE_BPS: u32 = 1500;

/// Default GOSI employee share in basis points (9.75%).
pub const DEFAULT_GOSI_EMPLOYEE_RATE_BPS: u32 = 975;

/// Default GOSI employer share in basis points (11.75%).
pub const DEFAULT_GOSI_EMPLOYER_RATE_BPS: u32 = 1175;
