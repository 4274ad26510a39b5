//! # Payroll Repository
//!
//! ## Run Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_run(2026-09, china_town)                                       │
//! │      │  payslips from active employees + GOSI rates in settings        │
//! │      ▼                                                                  │
//! │   DRAFT ──post──► POSTED ──pay──► PAID                                 │
//! │            │                │                                           │
//! │            │                └─ Dr 2430 accrued / Cr 1120 bank          │
//! │            └─ Dr 5200 salaries, 5210 GOSI                              │
//! │               Cr 2430 accrued, 2431 GOSI payable                       │
//! │                                                                         │
//! │  Each arrow is one transaction holding the run row lock.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use bistro_core::postings::{
    compute_payslip, payroll_accrual_journal, payroll_payment_journal, PayslipInput,
};
use bistro_core::validation::{validate_branch, validate_non_negative, validate_period};
use bistro_core::{CoreError, Money, PayrollItem, PayrollRun, PayrollStatus, ValidationError};

use super::employee::active_in_branch;
use super::journal::insert_entry;
use super::settings::load_settings;
use super::{clamp_limit, parse_column};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct RunRecord {
    id: i64,
    period: String,
    branch: String,
    status: String,
    journal_entry_id: Option<i64>,
    payment_entry_id: Option<i64>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRecord {
    id: i64,
    run_id: i64,
    employee_id: i64,
    employee_name: String,
    basic_cents: i64,
    allowances_cents: i64,
    deductions_cents: i64,
    gosi_employee_cents: i64,
    gosi_employer_cents: i64,
    net_cents: i64,
}

impl From<ItemRecord> for PayrollItem {
    fn from(r: ItemRecord) -> Self {
        PayrollItem {
            id: r.id,
            run_id: r.run_id,
            employee_id: r.employee_id,
            employee_name: r.employee_name,
            basic_cents: r.basic_cents,
            allowances_cents: r.allowances_cents,
            deductions_cents: r.deductions_cents,
            gosi_employee_cents: r.gosi_employee_cents,
            gosi_employer_cents: r.gosi_employer_cents,
            net_cents: r.net_cents,
        }
    }
}

const RUN_COLUMNS: &str =
    "id, period, branch, status, journal_entry_id, payment_entry_id, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayrollRun {
    /// `YYYY-MM`
    pub period: String,
    pub branch: String,
    /// Per-employee deductions in cents, keyed by employee id.
    #[serde(default)]
    pub deductions: HashMap<i64, i64>,
}

#[derive(Debug, Clone)]
pub struct PayrollRepository {
    pool: PgPool,
}

impl PayrollRepository {
    pub fn new(pool: PgPool) -> Self {
        PayrollRepository { pool }
    }

    /// Builds a draft run with one payslip per active employee.
    pub async fn create_run(&self, input: &NewPayrollRun) -> DbResult<PayrollRun> {
        validate_period(&input.period)?;
        validate_branch(&input.branch)?;
        for cents in input.deductions.values() {
            validate_non_negative("deductions", *cents)?;
        }

        let mut tx = self.pool.begin().await?;

        let settings = load_settings(&mut tx).await?;
        let employees = active_in_branch(&mut tx, &input.branch).await?;
        if employees.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "branch".to_string(),
                reason: format!("no active employees in {}", input.branch),
            }
            .into());
        }

        let run_id: i64 = sqlx::query_scalar(
            "INSERT INTO payroll_runs (period, branch, status) VALUES ($1, $2, 'draft') RETURNING id",
        )
        .bind(&input.period)
        .bind(&input.branch)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate(
                "payroll run",
                format!("{}/{}", input.period, input.branch),
            ),
            other => other,
        })?;

        for employee in &employees {
            let deductions = input.deductions.get(&employee.id).copied().unwrap_or(0);
            let slip = compute_payslip(
                PayslipInput {
                    basic: Money::from_cents(employee.basic_salary_cents),
                    allowances: Money::from_cents(employee.allowances_cents),
                    deductions: Money::from_cents(deductions),
                    gosi_enrolled: employee.gosi_enrolled,
                },
                &settings,
            )?;

            sqlx::query(
                r#"
                INSERT INTO payroll_items
                    (run_id, employee_id, employee_name, basic_cents, allowances_cents,
                     deductions_cents, gosi_employee_cents, gosi_employer_cents, net_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(run_id)
            .bind(employee.id)
            .bind(&employee.full_name)
            .bind(employee.basic_salary_cents)
            .bind(employee.allowances_cents)
            .bind(deductions)
            .bind(slip.gosi_employee.cents())
            .bind(slip.gosi_employer.cents())
            .bind(slip.net.cents())
            .execute(&mut *tx)
            .await?;
        }

        let run = fetch_run(&mut tx, run_id).await?;
        tx.commit().await?;

        info!(
            run_id,
            period = %run.period,
            branch = %run.branch,
            employees = run.items.len(),
            net = %run.total_net(),
            "Payroll run created"
        );
        Ok(run)
    }

    pub async fn get(&self, id: i64) -> DbResult<PayrollRun> {
        let mut conn = self.pool.acquire().await?;
        fetch_run(&mut conn, id).await
    }

    pub async fn list(&self, branch: Option<&str>, limit: Option<i64>) -> DbResult<Vec<PayrollRun>> {
        let records = sqlx::query_as::<_, RunRecord>(&format!(
            "SELECT {} FROM payroll_runs WHERE ($1::TEXT IS NULL OR branch = $1) \
             ORDER BY period DESC, branch LIMIT $2",
            RUN_COLUMNS
        ))
        .bind(branch)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        attach_items(&mut conn, records).await
    }

    /// Accrues a draft run.
    pub async fn post(&self, id: i64) -> DbResult<PayrollRun> {
        let mut tx = self.pool.begin().await?;

        let run = lock_run(&mut tx, id).await?;
        ensure_status(&run, PayrollStatus::Draft, "post")?;

        let entry_id = insert_entry(&mut tx, &payroll_accrual_journal(&run)?, true).await?;

        sqlx::query("UPDATE payroll_runs SET status = 'posted', journal_entry_id = $2 WHERE id = $1")
            .bind(id)
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        let posted = fetch_run(&mut tx, id).await?;
        tx.commit().await?;

        info!(run_id = id, entry_id, "Payroll run posted");
        Ok(posted)
    }

    /// Pays out a posted run from the bank.
    pub async fn pay(&self, id: i64) -> DbResult<PayrollRun> {
        let mut tx = self.pool.begin().await?;

        let run = lock_run(&mut tx, id).await?;
        ensure_status(&run, PayrollStatus::Posted, "pay")?;

        let entry_id = insert_entry(&mut tx, &payroll_payment_journal(&run), true).await?;

        sqlx::query("UPDATE payroll_runs SET status = 'paid', payment_entry_id = $2 WHERE id = $1")
            .bind(id)
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        let paid = fetch_run(&mut tx, id).await?;
        tx.commit().await?;

        info!(run_id = id, entry_id, net = %paid.total_net(), "Payroll run paid");
        Ok(paid)
    }
}

fn ensure_status(run: &PayrollRun, expected: PayrollStatus, operation: &str) -> DbResult<()> {
    if run.status != expected {
        return Err(CoreError::InvalidState {
            entity: "Payroll run".to_string(),
            id: run.id,
            status: run.status.to_string(),
            operation: operation.to_string(),
        }
        .into());
    }
    Ok(())
}

async fn lock_run(conn: &mut PgConnection, id: i64) -> DbResult<PayrollRun> {
    sqlx::query("SELECT id FROM payroll_runs WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Payroll run", id))?;
    fetch_run(conn, id).await
}

pub(crate) async fn fetch_run(conn: &mut PgConnection, id: i64) -> DbResult<PayrollRun> {
    let record = sqlx::query_as::<_, RunRecord>(&format!(
        "SELECT {} FROM payroll_runs WHERE id = $1",
        RUN_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Payroll run", id))?;

    attach_items(conn, vec![record])
        .await?
        .pop()
        .ok_or_else(|| DbError::not_found("Payroll run", id))
}

async fn attach_items(conn: &mut PgConnection, records: Vec<RunRecord>) -> DbResult<Vec<PayrollRun>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();

    let items = sqlx::query_as::<_, ItemRecord>(
        r#"
        SELECT id, run_id, employee_id, employee_name, basic_cents, allowances_cents,
               deductions_cents, gosi_employee_cents, gosi_employer_cents, net_cents
        FROM payroll_items
        WHERE run_id = ANY($1)
        ORDER BY run_id, id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_run: HashMap<i64, Vec<PayrollItem>> = HashMap::new();
    for item in items {
        by_run.entry(item.run_id).or_default().push(item.into());
    }

    records
        .into_iter()
        .map(|r| {
            Ok(PayrollRun {
                status: parse_column("status", &r.status)?,
                items: by_run.remove(&r.id).unwrap_or_default(),
                id: r.id,
                period: r.period,
                branch: r.branch,
                journal_entry_id: r.journal_entry_id,
                payment_entry_id: r.payment_entry_id,
                created_at: r.created_at,
            })
        })
        .collect()
}
