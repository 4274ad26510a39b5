//! # bistro-db: Database Layer for Bistro ERP
//!
//! PostgreSQL access for Bistro ERP through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bistro ERP Data Flow                             │
//! │                                                                         │
//! │  axum handler (POST /api/pos/issueInvoice)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bistro-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (order.rs,   │    │  (embedded)  │  │   │
//! │  │   │               │    │   journal.rs, │    │              │  │   │
//! │  │   │ PgPool        │◄───│   ...)        │    │ 001_init.sql │  │   │
//! │  │   │ TLS options   │    │               │    │ 002_guards   │  │   │
//! │  │   │               │    │               │    │ 003_prices   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   maintenance.rs: provision + ledger check (bistro-admin)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     PostgreSQL                                  │   │
//! │  │   triggers: posted entries immutable, balance checked at commit │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`maintenance`] - Provisioning and ledger diagnostics
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bistro_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new(std::env::var("DATABASE_URL")?)).await?;
//!
//! let saved = db.orders().save_draft(&input).await?;
//! println!("{} items, key {}", saved.order.items.len(), saved.storage_key);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod maintenance;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::{AccountRepository, EnsureOutcome, EnsuredAccount};
pub use repository::journal::{JournalFilter, JournalRepository, ReferenceTarget};
pub use repository::order::{OrderFilter, OrderRepository, SaveDraftInput, SavedDraft};
pub use repository::user::{hash_password, verify_password, UserCredentials, UserRepository};
