//! # Journal Repository
//!
//! Journal entries and postings. Every write goes through
//! [`insert_entry`], which validates the draft, resolves accounts and
//! writes the entry with its postings on the caller's connection.
//!
//! ## Posting Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  JournalDraft                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  draft.validate() ── UnbalancedEntry / InvalidPosting ──► rejected     │
//! │       │                  (nothing written)                              │
//! │       ▼                                                                 │
//! │  resolve accounts ── unknown code ──► NotFound (no implicit create)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT journal_entries (status = draft)                               │
//! │  INSERT journal_postings × n                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  post?  UPDATE status = 'posted'   ← deferred trigger re-checks        │
//! │       │                              balance at COMMIT                  │
//! │       ▼                                                                 │
//! │  caller commits (or drops → rollback)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use bistro_core::journal::{self, AccountKey, JournalDraft};
use bistro_core::{
    CoreError, EntryReference, EntryStatus, Expense, Invoice, JournalEntry, JournalPosting,
    PayrollRun, ValidationError, DEFAULT_BRANCH,
};

use super::{clamp_limit, parse_column};
use crate::error::{DbError, DbResult};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct EntryRecord {
    id: i64,
    entry_number: String,
    description: String,
    entry_date: NaiveDate,
    reference_type: Option<String>,
    reference_id: Option<i64>,
    branch: String,
    status: String,
    posted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntryRecord {
    fn into_entry(self, postings: Vec<JournalPosting>) -> DbResult<JournalEntry> {
        let reference =
            EntryReference::from_parts(self.reference_type.as_deref(), self.reference_id)
                .map_err(|e| DbError::Internal(e.to_string()))?;
        Ok(JournalEntry {
            id: self.id,
            entry_number: self.entry_number,
            description: self.description,
            entry_date: self.entry_date,
            reference,
            branch: self.branch,
            status: parse_column("status", &self.status)?,
            posted_at: self.posted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            postings,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PostingRecord {
    id: i64,
    entry_id: i64,
    account_id: i64,
    account_code: String,
    account_name: String,
    debit_cents: i64,
    credit_cents: i64,
    memo: Option<String>,
}

impl From<PostingRecord> for JournalPosting {
    fn from(r: PostingRecord) -> Self {
        JournalPosting {
            id: r.id,
            entry_id: r.entry_id,
            account_id: r.account_id,
            account_code: r.account_code,
            account_name: r.account_name,
            debit_cents: r.debit_cents,
            credit_cents: r.credit_cents,
            memo: r.memo,
        }
    }
}

const ENTRY_COLUMNS: &str = "id, entry_number, description, entry_date, reference_type, \
     reference_id, branch, status, posted_at, created_at, updated_at";

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// List filter for journal entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalFilter {
    pub status: Option<EntryStatus>,
    pub branch: Option<String>,
    pub reference_type: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// The document an entry was generated from, loaded per reference variant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "document", rename_all = "snake_case")]
pub enum ReferenceTarget {
    Manual,
    Expense(Expense),
    Invoice(Invoice),
    Payroll(PayrollRun),
    PayrollPayment(PayrollRun),
    Reversal(JournalEntry),
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for journal entries.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: PgPool,
}

impl JournalRepository {
    pub fn new(pool: PgPool) -> Self {
        JournalRepository { pool }
    }

    /// Creates an entry with its postings in one transaction.
    ///
    /// With `post = true` the entry is posted immediately.
    pub async fn create_entry(&self, draft: &JournalDraft, post: bool) -> DbResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;
        let id = insert_entry(&mut tx, draft, post).await?;
        let entry = fetch_entry(&mut tx, id).await?;
        tx.commit().await?;
        Ok(entry)
    }

    pub async fn get(&self, id: i64) -> DbResult<JournalEntry> {
        let mut conn = self.pool.acquire().await?;
        fetch_entry(&mut conn, id).await
    }

    /// Entries matching the filter, newest first, postings attached.
    pub async fn list(&self, filter: &JournalFilter) -> DbResult<Vec<JournalEntry>> {
        let records = sqlx::query_as::<_, EntryRecord>(&format!(
            r#"
            SELECT {}
            FROM journal_entries
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR branch = $2)
              AND ($3::TEXT IS NULL OR reference_type = $3)
              AND ($4::DATE IS NULL OR entry_date >= $4)
              AND ($5::DATE IS NULL OR entry_date <= $5)
            ORDER BY entry_date DESC, id DESC
            LIMIT $6 OFFSET $7
            "#,
            ENTRY_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.branch.as_deref())
        .bind(filter.reference_type.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(clamp_limit(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        attach_postings(&mut conn, records).await
    }

    /// Moves a draft entry to posted after re-checking its stored postings.
    pub async fn post_entry(&self, id: i64) -> DbResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;

        let entry = lock_entry(&mut tx, id).await?;
        if entry.status == EntryStatus::Posted {
            return Err(CoreError::EntryImmutable {
                entry: entry.entry_number,
            }
            .into());
        }
        journal::verify_postings(&entry.postings)?;

        sqlx::query(
            "UPDATE journal_entries SET status = 'posted', posted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'draft'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let posted = fetch_entry(&mut tx, id).await?;
        tx.commit().await?;

        info!(entry = %posted.entry_number, "Journal entry posted");
        Ok(posted)
    }

    /// Posts a correcting entry with the sides swapped.
    pub async fn reverse_entry(&self, id: i64) -> DbResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;

        let entry = lock_entry(&mut tx, id).await?;
        if entry.status != EntryStatus::Posted {
            return Err(CoreError::InvalidState {
                entity: "Journal entry".to_string(),
                id,
                status: entry.status.to_string(),
                operation: "reverse".to_string(),
            }
            .into());
        }

        let already: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM journal_entries WHERE reference_type = 'reversal' AND reference_id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if already.is_some() {
            return Err(CoreError::InvalidState {
                entity: "Journal entry".to_string(),
                id,
                status: "already reversed".to_string(),
                operation: "reverse".to_string(),
            }
            .into());
        }

        let draft = journal::reversal_of(&entry, Utc::now().date_naive());
        let reversal_id = insert_entry(&mut tx, &draft, true).await?;
        let reversal = fetch_entry(&mut tx, reversal_id).await?;

        tx.commit().await?;
        info!(
            entry = %entry.entry_number,
            reversal = %reversal.entry_number,
            "Journal entry reversed"
        );
        Ok(reversal)
    }

    /// Deletes a draft entry. Posted entries are immutable.
    pub async fn delete_entry(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let entry = lock_entry(&mut tx, id).await?;
        if entry.status == EntryStatus::Posted {
            return Err(CoreError::EntryImmutable {
                entry: entry.entry_number,
            }
            .into());
        }

        sqlx::query("DELETE FROM journal_entries WHERE id = $1 AND status = 'draft'")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(entry = %entry.entry_number, "Draft journal entry deleted");
        Ok(())
    }

    /// Loads the document behind an entry's reference.
    pub async fn resolve_reference(&self, reference: EntryReference) -> DbResult<ReferenceTarget> {
        let mut conn = self.pool.acquire().await?;
        Ok(match reference {
            EntryReference::Manual => ReferenceTarget::Manual,
            EntryReference::Expense(id) => {
                ReferenceTarget::Expense(super::expense::fetch_expense(&mut conn, id).await?)
            }
            EntryReference::Invoice(id) => {
                ReferenceTarget::Invoice(super::invoice::fetch_invoice(&mut conn, id).await?)
            }
            EntryReference::Payroll(id) => {
                ReferenceTarget::Payroll(super::payroll::fetch_run(&mut conn, id).await?)
            }
            EntryReference::PayrollPayment(id) => {
                ReferenceTarget::PayrollPayment(super::payroll::fetch_run(&mut conn, id).await?)
            }
            EntryReference::Reversal(id) => {
                ReferenceTarget::Reversal(fetch_entry(&mut conn, id).await?)
            }
        })
    }

    /// Posted entries whose postings do not balance, as
    /// `(entry_number, debit, credit)`.
    pub async fn unbalanced_posted(&self) -> DbResult<Vec<(String, i64, i64)>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT e.entry_number,
                   COALESCE(SUM(p.debit_cents), 0)::BIGINT,
                   COALESCE(SUM(p.credit_cents), 0)::BIGINT
            FROM journal_entries e
            LEFT JOIN journal_postings p ON p.entry_id = e.id
            WHERE e.status = 'posted'
            GROUP BY e.id, e.entry_number
            HAVING COALESCE(SUM(p.debit_cents), 0) <> COALESCE(SUM(p.credit_cents), 0)
                OR COUNT(p.id) < 2
            ORDER BY e.entry_number
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Shared helpers (used inside other repositories' transactions)
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ResolvedAccount {
    id: i64,
    code: String,
    is_active: bool,
}

async fn resolve_account(conn: &mut PgConnection, key: &AccountKey) -> DbResult<ResolvedAccount> {
    let found = match key {
        AccountKey::Id(id) => {
            sqlx::query_as::<_, ResolvedAccount>(
                "SELECT id, code, is_active FROM accounts WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        }
        AccountKey::Code(code) => {
            sqlx::query_as::<_, ResolvedAccount>(
                "SELECT id, code, is_active FROM accounts WHERE code = $1",
            )
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    let account = found.ok_or_else(|| DbError::not_found("Account", key))?;
    if !account.is_active {
        return Err(ValidationError::InvalidFormat {
            field: "account".to_string(),
            reason: format!("account {} is inactive", account.code),
        }
        .into());
    }
    Ok(account)
}

/// Validates and writes a draft on the given connection. Returns the entry id.
///
/// Nothing is committed here; the caller owns the transaction.
pub(crate) async fn insert_entry(
    conn: &mut PgConnection,
    draft: &JournalDraft,
    post: bool,
) -> DbResult<i64> {
    draft.validate()?;

    let mut accounts = HashMap::new();
    for line in &draft.lines {
        if !accounts.contains_key(&line.account) {
            let resolved = resolve_account(conn, &line.account).await?;
            accounts.insert(line.account.clone(), resolved.id);
        }
    }

    let date = draft.entry_date.unwrap_or_else(|| Utc::now().date_naive());
    let branch = draft.branch.as_deref().unwrap_or(DEFAULT_BRANCH);

    let seq: i64 = sqlx::query_scalar("SELECT nextval('journal_entry_number_seq')")
        .fetch_one(&mut *conn)
        .await?;
    let entry_number = journal::document_number("JE", date, seq);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO journal_entries
            (entry_number, description, entry_date, reference_type, reference_id, branch, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'draft')
        RETURNING id
        "#,
    )
    .bind(&entry_number)
    .bind(draft.description.trim())
    .bind(date)
    .bind(draft.reference.reference_type())
    .bind(draft.reference.reference_id())
    .bind(branch)
    .fetch_one(&mut *conn)
    .await?;

    for line in &draft.lines {
        sqlx::query(
            r#"
            INSERT INTO journal_postings (entry_id, account_id, debit_cents, credit_cents, memo)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(accounts[&line.account])
        .bind(line.debit.cents())
        .bind(line.credit.cents())
        .bind(line.memo.as_deref())
        .execute(&mut *conn)
        .await?;
    }

    if post {
        sqlx::query(
            "UPDATE journal_entries SET status = 'posted', posted_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        entry = %entry_number,
        lines = draft.lines.len(),
        total = %draft.total_debit(),
        posted = post,
        "Journal entry written"
    );
    Ok(id)
}

pub(crate) async fn fetch_entry(conn: &mut PgConnection, id: i64) -> DbResult<JournalEntry> {
    let record = sqlx::query_as::<_, EntryRecord>(&format!(
        "SELECT {} FROM journal_entries WHERE id = $1",
        ENTRY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Journal entry", id))?;

    let mut entries = attach_postings(conn, vec![record]).await?;
    entries
        .pop()
        .ok_or_else(|| DbError::not_found("Journal entry", id))
}

async fn lock_entry(conn: &mut PgConnection, id: i64) -> DbResult<JournalEntry> {
    sqlx::query("SELECT id FROM journal_entries WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Journal entry", id))?;
    fetch_entry(conn, id).await
}

/// Loads postings for all records in one query and attaches them.
async fn attach_postings(
    conn: &mut PgConnection,
    records: Vec<EntryRecord>,
) -> DbResult<Vec<JournalEntry>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();

    let postings = sqlx::query_as::<_, PostingRecord>(
        r#"
        SELECT p.id, p.entry_id, p.account_id,
               a.code AS account_code, a.name AS account_name,
               p.debit_cents, p.credit_cents, p.memo
        FROM journal_postings p
        JOIN accounts a ON a.id = p.account_id
        WHERE p.entry_id = ANY($1)
        ORDER BY p.entry_id, p.id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_entry: HashMap<i64, Vec<JournalPosting>> = HashMap::new();
    for p in postings {
        by_entry.entry(p.entry_id).or_default().push(p.into());
    }

    records
        .into_iter()
        .map(|r| {
            let postings = by_entry.remove(&r.id).unwrap_or_default();
            r.into_entry(postings)
        })
        .collect()
}
