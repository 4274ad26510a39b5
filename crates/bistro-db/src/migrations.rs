//! # Database Migrations
//!
//! Embedded SQL migrations for Bistro ERP.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  API startup / `bistro-admin migrate`                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Check _sqlx_migrations table                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Compare embedded migrations vs applied                                │
//! │       │                                                                 │
//! │       ├── 001_initial_schema.sql      ✓ (already applied)              │
//! │       └── 002_posted_entry_guards.sql ⬜ (needs to run)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Run pending migrations in order, record each checksum                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/postgres/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::DbResult;

/// Embedded migrations from the `migrations/postgres` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/postgres");

/// Applied vs. embedded migrations, as reported by `bistro-admin status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migrations compiled into this binary.
    pub embedded: usize,
    /// Successfully applied versions found in the database.
    pub applied: usize,
    /// `(version, description)` of every embedded migration not yet applied.
    pub pending: Vec<(i64, String)>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies every pending migration in version order.
///
/// Applied versions are tracked in `_sqlx_migrations`, so a second run is a
/// no-op. Each file runs in its own transaction.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    let before = migration_status(pool).await?;
    if before.is_current() {
        debug!(applied = before.applied, "Schema is current");
        return Ok(());
    }

    for (version, description) in &before.pending {
        info!(version, description = %description, "Applying migration");
    }
    MIGRATOR.run(pool).await?;

    info!(count = before.pending.len(), "Migrations applied");
    Ok(())
}

/// Compares the embedded migrations with the versions recorded in the database.
pub async fn migration_status(pool: &PgPool) -> DbResult<MigrationStatus> {
    // The bookkeeping table is only created by the first run.
    let tracked: bool = sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
        .fetch_one(pool)
        .await?;

    let applied: Vec<i64> = if tracked {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        Vec::new()
    };

    let pending = MIGRATOR
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .map(|m| (m.version, m.description.to_string()))
        .collect();

    Ok(MigrationStatus {
        embedded: MIGRATOR.iter().count(),
        applied: applied.len(),
        pending,
    })
}
