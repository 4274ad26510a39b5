//! # Expense Repository
//!
//! Expenses are recorded as drafts and posted separately. Posting writes
//! the journal entry and flips the expense in one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use bistro_core::postings::{expense_journal, expense_vat};
use bistro_core::validation::{validate_branch, validate_name, validate_positive_amount};
use bistro_core::{
    AccountType, CoreError, Expense, ExpenseStatus, Money, PaymentMethod, ValidationError,
};

use super::journal::insert_entry;
use super::settings::load_settings;
use super::{clamp_limit, parse_column};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct ExpenseRecord {
    id: i64,
    branch: String,
    partner_id: Option<i64>,
    expense_account_id: i64,
    description: String,
    amount_cents: i64,
    vat_cents: i64,
    total_cents: i64,
    payment_method: String,
    expense_date: NaiveDate,
    status: String,
    journal_entry_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl ExpenseRecord {
    fn into_expense(self) -> DbResult<Expense> {
        Ok(Expense {
            payment_method: parse_column("payment_method", &self.payment_method)?,
            status: parse_column("status", &self.status)?,
            id: self.id,
            branch: self.branch,
            partner_id: self.partner_id,
            expense_account_id: self.expense_account_id,
            description: self.description,
            amount_cents: self.amount_cents,
            vat_cents: self.vat_cents,
            total_cents: self.total_cents,
            expense_date: self.expense_date,
            journal_entry_id: self.journal_entry_id,
            created_at: self.created_at,
        })
    }
}

const EXPENSE_COLUMNS: &str = "id, branch, partner_id, expense_account_id, description, \
     amount_cents, vat_cents, total_cents, payment_method, expense_date, status, \
     journal_entry_id, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub branch: String,
    #[serde(default)]
    pub partner_id: Option<i64>,
    pub expense_account_id: i64,
    pub description: String,
    /// Net amount before VAT.
    pub amount_cents: i64,
    /// VAT as stated on the supplier invoice; computed when absent.
    #[serde(default)]
    pub vat_cents: Option<i64>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub expense_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseFilter {
    pub branch: Option<String>,
    pub status: Option<ExpenseStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: PgPool,
}

impl ExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        ExpenseRepository { pool }
    }

    /// Records a draft expense. VAT defaults to the configured rate.
    pub async fn create(&self, input: &NewExpense) -> DbResult<Expense> {
        validate_branch(&input.branch)?;
        validate_name("description", &input.description)?;
        validate_positive_amount("amount_cents", input.amount_cents)?;

        let mut tx = self.pool.begin().await?;

        let account_type: Option<String> =
            sqlx::query_scalar("SELECT account_type FROM accounts WHERE id = $1 AND is_active")
                .bind(input.expense_account_id)
                .fetch_optional(&mut *tx)
                .await?;
        match account_type {
            None => return Err(DbError::not_found("Account", input.expense_account_id)),
            Some(t) if t != AccountType::Expense.as_str() => {
                return Err(ValidationError::InvalidFormat {
                    field: "expense_account_id".to_string(),
                    reason: format!("account {} is not an expense account", input.expense_account_id),
                }
                .into())
            }
            Some(_) => {}
        }

        let settings = load_settings(&mut tx).await?;
        let amount = Money::from_cents(input.amount_cents);
        let vat = expense_vat(amount, input.vat_cents.map(Money::from_cents), settings.vat_rate())?;
        let total = amount + vat;

        let record = sqlx::query_as::<_, ExpenseRecord>(&format!(
            r#"
            INSERT INTO expenses
                (branch, partner_id, expense_account_id, description, amount_cents,
                 vat_cents, total_cents, payment_method, expense_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'draft')
            RETURNING {}
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(&input.branch)
        .bind(input.partner_id)
        .bind(input.expense_account_id)
        .bind(input.description.trim())
        .bind(amount.cents())
        .bind(vat.cents())
        .bind(total.cents())
        .bind(input.payment_method.as_str())
        .bind(input.expense_date.unwrap_or_else(|| Utc::now().date_naive()))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(expense_id = record.id, total = %total, "Expense recorded");
        record.into_expense()
    }

    pub async fn get(&self, id: i64) -> DbResult<Expense> {
        let mut conn = self.pool.acquire().await?;
        fetch_expense(&mut conn, id).await
    }

    pub async fn list(&self, filter: &ExpenseFilter) -> DbResult<Vec<Expense>> {
        let records = sqlx::query_as::<_, ExpenseRecord>(&format!(
            r#"
            SELECT {}
            FROM expenses
            WHERE ($1::TEXT IS NULL OR branch = $1)
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::DATE IS NULL OR expense_date >= $3)
              AND ($4::DATE IS NULL OR expense_date <= $4)
            ORDER BY expense_date DESC, id DESC
            LIMIT $5 OFFSET $6
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(filter.branch.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(clamp_limit(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(ExpenseRecord::into_expense).collect()
    }

    /// Posts a draft expense to the ledger.
    pub async fn post(&self, id: i64) -> DbResult<Expense> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM expenses WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Expense", id))?;
        let expense = fetch_expense(&mut tx, id).await?;

        if expense.status != ExpenseStatus::Draft {
            return Err(CoreError::InvalidState {
                entity: "Expense".to_string(),
                id,
                status: expense.status.to_string(),
                operation: "post".to_string(),
            }
            .into());
        }

        let entry_id = insert_entry(&mut tx, &expense_journal(&expense), true).await?;

        sqlx::query(
            "UPDATE expenses SET status = 'posted', journal_entry_id = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(entry_id)
        .execute(&mut *tx)
        .await?;

        let posted = fetch_expense(&mut tx, id).await?;
        tx.commit().await?;

        info!(expense_id = id, entry_id, "Expense posted");
        Ok(posted)
    }
}

pub(crate) async fn fetch_expense(conn: &mut PgConnection, id: i64) -> DbResult<Expense> {
    sqlx::query_as::<_, ExpenseRecord>(&format!(
        "SELECT {} FROM expenses WHERE id = $1",
        EXPENSE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Expense", id))?
    .into_expense()
}
