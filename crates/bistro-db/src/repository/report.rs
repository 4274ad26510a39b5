//! # Report Repository
//!
//! Aggregates posted journal postings. Draft entries never count.
//! Balances are signed in bistro-core (`report` module); SQL only sums.

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;

use bistro_core::chart;
use bistro_core::report::{
    build_statement, AccountStatement, Movement, SalesDay, TrialBalance, TrialBalanceRow,
    VatSummary,
};
use bistro_core::{AccountNature, Money};

use super::parse_column;
use crate::error::{DbError, DbResult};

/// Date range and branch shared by every report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportPeriod {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub branch: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct BalanceRow {
    id: i64,
    code: String,
    name: String,
    account_type: String,
    nature: String,
    opening_balance_cents: i64,
    debit_before: i64,
    credit_before: i64,
    debit: i64,
    credit: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    entry_id: i64,
    entry_number: String,
    entry_date: NaiveDate,
    description: String,
    debit_cents: i64,
    credit_cents: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SalesRow {
    day: NaiveDate,
    branch: String,
    invoice_count: i64,
    subtotal_cents: i64,
    discount_cents: i64,
    vat_cents: i64,
    total_cents: i64,
}

/// Per-account sums split at the period start. Bind order: from, to, branch.
const BALANCES_SQL: &str = r#"
    SELECT a.id, a.code, a.name, a.account_type, a.nature, a.opening_balance_cents,
           COALESCE(SUM(p.debit_cents)  FILTER (WHERE e.id IS NOT NULL AND e.entry_date < $1), 0)::BIGINT AS debit_before,
           COALESCE(SUM(p.credit_cents) FILTER (WHERE e.id IS NOT NULL AND e.entry_date < $1), 0)::BIGINT AS credit_before,
           COALESCE(SUM(p.debit_cents)  FILTER (WHERE e.id IS NOT NULL AND ($1::DATE IS NULL OR e.entry_date >= $1)), 0)::BIGINT AS debit,
           COALESCE(SUM(p.credit_cents) FILTER (WHERE e.id IS NOT NULL AND ($1::DATE IS NULL OR e.entry_date >= $1)), 0)::BIGINT AS credit
    FROM accounts a
    LEFT JOIN journal_postings p ON p.account_id = a.id
    LEFT JOIN journal_entries e ON e.id = p.entry_id
        AND e.status = 'posted'
        AND ($2::DATE IS NULL OR e.entry_date <= $2)
        AND ($3::TEXT IS NULL OR e.branch = $3)
    GROUP BY a.id
    ORDER BY a.code
"#;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        ReportRepository { pool }
    }

    /// Trial balance over the period. Accounts with no balance and no
    /// movement are left out.
    pub async fn trial_balance(&self, period: &ReportPeriod) -> DbResult<TrialBalance> {
        let rows = self.balances(period).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let nature: AccountNature = parse_column("nature", &row.nature)?;
            let opening = Money::from_cents(row.opening_balance_cents)
                + nature.signed(
                    Money::from_cents(row.debit_before),
                    Money::from_cents(row.credit_before),
                );
            if opening.is_zero() && row.debit == 0 && row.credit == 0 {
                continue;
            }
            out.push(TrialBalanceRow::compute(
                row.id,
                row.code,
                row.name,
                parse_column("account_type", &row.account_type)?,
                nature,
                opening,
                Money::from_cents(row.debit),
                Money::from_cents(row.credit),
            ));
        }

        Ok(TrialBalance::from_rows(out))
    }

    /// Postings of one account in date order with a running balance.
    pub async fn account_statement(
        &self,
        account_id: i64,
        period: &ReportPeriod,
    ) -> DbResult<AccountStatement> {
        let account = self
            .balances(period)
            .await?
            .into_iter()
            .find(|r| r.id == account_id)
            .ok_or_else(|| DbError::not_found("Account", account_id))?;

        let nature: AccountNature = parse_column("nature", &account.nature)?;
        let opening = Money::from_cents(account.opening_balance_cents)
            + nature.signed(
                Money::from_cents(account.debit_before),
                Money::from_cents(account.credit_before),
            );

        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT e.id AS entry_id, e.entry_number, e.entry_date, e.description,
                   p.debit_cents, p.credit_cents
            FROM journal_postings p
            JOIN journal_entries e ON e.id = p.entry_id
            WHERE p.account_id = $1
              AND e.status = 'posted'
              AND ($2::DATE IS NULL OR e.entry_date >= $2)
              AND ($3::DATE IS NULL OR e.entry_date <= $3)
              AND ($4::TEXT IS NULL OR e.branch = $4)
            ORDER BY e.entry_date, e.id, p.id
            "#,
        )
        .bind(account_id)
        .bind(period.from)
        .bind(period.to)
        .bind(period.branch.as_deref())
        .fetch_all(&self.pool)
        .await?;

        let movements = rows
            .into_iter()
            .map(|r| Movement {
                entry_id: r.entry_id,
                entry_number: r.entry_number,
                entry_date: r.entry_date,
                description: r.description,
                debit: Money::from_cents(r.debit_cents),
                credit: Money::from_cents(r.credit_cents),
            })
            .collect();

        Ok(build_statement(
            account.id,
            account.code,
            account.name,
            nature,
            opening,
            movements,
        ))
    }

    /// Output VAT (2110) against input VAT (2120) for the period.
    pub async fn vat_summary(&self, period: &ReportPeriod) -> DbResult<VatSummary> {
        let (output, input): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(p.credit_cents - p.debit_cents) FILTER (WHERE a.code = $1), 0)::BIGINT,
                COALESCE(SUM(p.debit_cents - p.credit_cents) FILTER (WHERE a.code = $2), 0)::BIGINT
            FROM journal_postings p
            JOIN accounts a ON a.id = p.account_id
            JOIN journal_entries e ON e.id = p.entry_id
            WHERE e.status = 'posted'
              AND a.code IN ($1, $2)
              AND ($3::DATE IS NULL OR e.entry_date >= $3)
              AND ($4::DATE IS NULL OR e.entry_date <= $4)
              AND ($5::TEXT IS NULL OR e.branch = $5)
            "#,
        )
        .bind(chart::OUTPUT_VAT)
        .bind(chart::INPUT_VAT)
        .bind(period.from)
        .bind(period.to)
        .bind(period.branch.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(VatSummary::new(Money::from_cents(output), Money::from_cents(input)))
    }

    /// Posted invoices grouped by day and branch.
    pub async fn sales_summary(&self, period: &ReportPeriod) -> DbResult<Vec<SalesDay>> {
        let rows = sqlx::query_as::<_, SalesRow>(
            r#"
            SELECT issued_at::DATE AS day, branch,
                   COUNT(*)::BIGINT AS invoice_count,
                   SUM(subtotal_cents)::BIGINT AS subtotal_cents,
                   SUM(discount_cents)::BIGINT AS discount_cents,
                   SUM(vat_cents)::BIGINT AS vat_cents,
                   SUM(total_cents)::BIGINT AS total_cents
            FROM invoices
            WHERE status = 'posted'
              AND ($1::DATE IS NULL OR issued_at::DATE >= $1)
              AND ($2::DATE IS NULL OR issued_at::DATE <= $2)
              AND ($3::TEXT IS NULL OR branch = $3)
            GROUP BY issued_at::DATE, branch
            ORDER BY day, branch
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .bind(period.branch.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SalesDay {
                day: r.day,
                branch: r.branch,
                invoice_count: r.invoice_count,
                subtotal_cents: r.subtotal_cents,
                discount_cents: r.discount_cents,
                vat_cents: r.vat_cents,
                total_cents: r.total_cents,
            })
            .collect())
    }

    async fn balances(&self, period: &ReportPeriod) -> DbResult<Vec<BalanceRow>> {
        let rows = sqlx::query_as::<_, BalanceRow>(BALANCES_SQL)
            .bind(period.from)
            .bind(period.to)
            .bind(period.branch.as_deref())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
