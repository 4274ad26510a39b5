//! # Account Repository
//!
//! Chart-of-accounts storage and idempotent provisioning.
//!
//! ## ensure_account
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ensure_account(2430 "Accrued Salaries", parent 2000)                  │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   │                                                                     │
//! │   ├── parent_id ← SELECT id FROM accounts WHERE code = '2000'          │
//! │   │                                                                     │
//! │   ├── INSERT ... ON CONFLICT (code) DO NOTHING RETURNING id            │
//! │   │      ├── row returned ───────────────────────► Created             │
//! │   │      └── no row (code exists)                                       │
//! │   │             │                                                       │
//! │   │             ▼                                                       │
//! │   │      SELECT id, parent_id ... FOR UPDATE                           │
//! │   │             ├── parent matches ──────────────► Unchanged           │
//! │   │             └── misfiled ── UPDATE parent_id ► Reparented          │
//! │   │                                                                     │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  id, name and type of an existing account are never touched.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};

use bistro_core::chart::{self, AccountNode, RequiredAccount, REQUIRED_ACCOUNTS};
use bistro_core::validation::{validate_account_code, validate_name};
use bistro_core::{Account, AccountNature, AccountType, CoreError};

use super::parse_column;
use crate::error::{DbError, DbResult};

// =============================================================================
// Records & Inputs
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct AccountRecord {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub nature: String,
    pub parent_id: Option<i64>,
    pub opening_balance_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRecord {
    pub(crate) fn into_account(self) -> DbResult<Account> {
        Ok(Account {
            account_type: parse_column("account_type", &self.account_type)?,
            nature: parse_column("nature", &self.nature)?,
            id: self.id,
            code: self.code,
            name: self.name,
            parent_id: self.parent_id,
            opening_balance_cents: self.opening_balance_cents,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) const ACCOUNT_COLUMNS: &str = "id, code, name, account_type, nature, parent_id, \
     opening_balance_cents, is_active, created_at, updated_at";

/// Input for creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    /// Derived from the type when omitted.
    #[serde(default)]
    pub nature: Option<AccountNature>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub opening_balance_cents: i64,
}

/// Editable account fields. Code and type are fixed once created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub opening_balance_cents: Option<i64>,
    pub is_active: Option<bool>,
}

/// What `ensure_account` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnsureOutcome {
    Created,
    Reparented,
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsuredAccount {
    pub code: String,
    pub id: i64,
    pub outcome: EnsureOutcome,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for chart-of-accounts operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        AccountRepository { pool }
    }

    /// All accounts ordered by code.
    pub async fn list(&self) -> DbResult<Vec<Account>> {
        let records = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {} FROM accounts ORDER BY code",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(AccountRecord::into_account).collect()
    }

    /// Accounts assembled into a tree.
    pub async fn tree(&self) -> DbResult<Vec<AccountNode>> {
        let accounts = self.list().await?;
        Ok(chart::build_tree(&accounts))
    }

    pub async fn get(&self, id: i64) -> DbResult<Account> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {} FROM accounts WHERE code = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Account", code))?;

        record.into_account()
    }

    /// Creates an account under an existing parent (or as a root).
    pub async fn create(&self, input: NewAccount) -> DbResult<Account> {
        validate_account_code(&input.code)?;
        validate_name("name", &input.name)?;

        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = input.parent_id {
            fetch_by_id(&mut tx, parent_id).await?;
        }

        let nature = input
            .nature
            .unwrap_or_else(|| input.account_type.natural_nature());

        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            r#"
            INSERT INTO accounts (code, name, account_type, nature, parent_id, opening_balance_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(input.code.trim())
        .bind(input.name.trim())
        .bind(input.account_type.as_str())
        .bind(nature.as_str())
        .bind(input.parent_id)
        .bind(input.opening_balance_cents)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", input.code.clone()),
            other => other,
        })?;

        tx.commit().await?;

        info!(code = %record.code, id = record.id, "Account created");
        record.into_account()
    }

    pub async fn update(&self, id: i64, update: AccountUpdate) -> DbResult<Account> {
        if let Some(name) = &update.name {
            validate_name("name", name)?;
        }

        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            r#"
            UPDATE accounts SET
                name = COALESCE($2, name),
                opening_balance_cents = COALESCE($3, opening_balance_cents),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.opening_balance_cents)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Account", id))?;

        record.into_account()
    }

    /// Moves an account under a new parent (or to the root).
    ///
    /// The moved account is locked for the duration; a move that would
    /// make the account its own ancestor fails with `AccountCycle`.
    pub async fn set_parent(&self, id: i64, parent_id: Option<i64>) -> DbResult<Account> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Account", id))?;

        reparent(&mut tx, id, parent_id).await?;
        let account = fetch_by_id(&mut tx, id).await?;

        tx.commit().await?;
        Ok(account)
    }

    /// Deletes an account with no postings and no children.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let account = fetch_by_id(&mut tx, id).await?;

        let postings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM journal_postings WHERE account_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE parent_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if postings > 0 || children > 0 {
            return Err(CoreError::InvalidState {
                entity: "Account".to_string(),
                id,
                status: if postings > 0 { "in use" } else { "a parent" }.to_string(),
                operation: "delete".to_string(),
            }
            .into());
        }

        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(code = %account.code, id, "Account deleted");
        Ok(())
    }

    /// Makes sure a required account exists and sits under its parent.
    pub async fn ensure_account(&self, spec: &RequiredAccount) -> DbResult<EnsuredAccount> {
        let mut tx = self.pool.begin().await?;

        let parent_id: Option<i64> = match spec.parent_code {
            Some(code) => Some(
                sqlx::query_scalar("SELECT id FROM accounts WHERE code = $1")
                    .bind(code)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| DbError::not_found("Account", code))?,
            ),
            None => None,
        };

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (code, name, account_type, nature, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(spec.code)
        .bind(spec.name)
        .bind(spec.account_type.as_str())
        .bind(spec.account_type.natural_nature().as_str())
        .bind(parent_id)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match inserted {
            Some(id) => EnsuredAccount {
                code: spec.code.to_string(),
                id,
                outcome: EnsureOutcome::Created,
            },
            None => {
                let (id, current_parent): (i64, Option<i64>) = sqlx::query_as(
                    "SELECT id, parent_id FROM accounts WHERE code = $1 FOR UPDATE",
                )
                .bind(spec.code)
                .fetch_one(&mut *tx)
                .await?;

                if current_parent == parent_id {
                    EnsuredAccount {
                        code: spec.code.to_string(),
                        id,
                        outcome: EnsureOutcome::Unchanged,
                    }
                } else {
                    warn!(
                        code = spec.code,
                        from = ?current_parent,
                        to = ?parent_id,
                        "Reparenting misfiled account"
                    );
                    reparent(&mut tx, id, parent_id).await?;
                    EnsuredAccount {
                        code: spec.code.to_string(),
                        id,
                        outcome: EnsureOutcome::Reparented,
                    }
                }
            }
        };

        tx.commit().await?;
        debug!(code = spec.code, outcome = ?result.outcome, "Account ensured");
        Ok(result)
    }

    /// Ensures every account in the required chart, parents first.
    pub async fn ensure_required(&self) -> DbResult<Vec<EnsuredAccount>> {
        let mut results = Vec::with_capacity(REQUIRED_ACCOUNTS.len());
        for spec in REQUIRED_ACCOUNTS {
            results.push(self.ensure_account(spec).await?);
        }

        let created = results
            .iter()
            .filter(|r| r.outcome == EnsureOutcome::Created)
            .count();
        let reparented = results
            .iter()
            .filter(|r| r.outcome == EnsureOutcome::Reparented)
            .count();
        info!(created, reparented, "Required accounts ensured");

        Ok(results)
    }

    /// `id → parent_id` for every account (cycle checks, diagnostics).
    pub async fn parent_map(&self) -> DbResult<HashMap<i64, Option<i64>>> {
        let mut conn = self.pool.acquire().await?;
        load_parent_map(&mut conn).await
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

pub(crate) async fn fetch_by_id(conn: &mut PgConnection, id: i64) -> DbResult<Account> {
    sqlx::query_as::<_, AccountRecord>(&format!(
        "SELECT {} FROM accounts WHERE id = $1",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Account", id))?
    .into_account()
}

async fn load_parent_map(conn: &mut PgConnection) -> DbResult<HashMap<i64, Option<i64>>> {
    let rows: Vec<(i64, Option<i64>)> = sqlx::query_as("SELECT id, parent_id FROM accounts")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Sets `parent_id` after checking the parent exists and no cycle forms.
async fn reparent(conn: &mut PgConnection, id: i64, parent_id: Option<i64>) -> DbResult<()> {
    if let Some(parent) = parent_id {
        let parents = load_parent_map(conn).await?;
        if !parents.contains_key(&parent) {
            return Err(DbError::not_found("Account", parent));
        }
        if chart::would_create_cycle(&parents, id, parent) {
            return Err(CoreError::AccountCycle { account: id, parent }.into());
        }
    }

    sqlx::query("UPDATE accounts SET parent_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
