//! # Branch Repository
//!
//! Branch lookups and the default-branch repair routine.

use sqlx::PgPool;
use tracing::info;

use bistro_core::validation::{validate_branch, validate_name};
use bistro_core::Branch;

use crate::error::DbResult;

#[derive(Debug, Clone, sqlx::FromRow)]
struct BranchRecord {
    code: String,
    name: String,
    is_default: bool,
}

impl From<BranchRecord> for Branch {
    fn from(r: BranchRecord) -> Self {
        Branch {
            code: r.code,
            name: r.name,
            is_default: r.is_default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: PgPool,
}

impl BranchRepository {
    pub fn new(pool: PgPool) -> Self {
        BranchRepository { pool }
    }

    pub async fn list(&self) -> DbResult<Vec<Branch>> {
        let records = sqlx::query_as::<_, BranchRecord>(
            "SELECT code, name, is_default FROM branches ORDER BY is_default DESC, code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Branch::from).collect())
    }

    /// The branch flagged as default, if any.
    pub async fn default_branch(&self) -> DbResult<Option<Branch>> {
        let record = sqlx::query_as::<_, BranchRecord>(
            "SELECT code, name, is_default FROM branches WHERE is_default",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Branch::from))
    }

    /// Creates the branch if missing; marks it default when no other
    /// default exists. Returns `true` when a row was inserted.
    pub async fn ensure_default(&self, code: &str, name: &str) -> DbResult<bool> {
        validate_branch(code)?;
        validate_name("name", name)?;

        let mut tx = self.pool.begin().await?;

        let has_default: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM branches WHERE is_default)")
                .fetch_one(&mut *tx)
                .await?;

        let inserted = sqlx::query(
            "INSERT INTO branches (code, name, is_default) VALUES ($1, $2, $3) \
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(code)
        .bind(name)
        .bind(!has_default)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if !inserted && !has_default {
            sqlx::query("UPDATE branches SET is_default = TRUE WHERE code = $1")
                .bind(code)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if inserted {
            info!(branch = code, "Default branch created");
        }
        Ok(inserted)
    }
}
