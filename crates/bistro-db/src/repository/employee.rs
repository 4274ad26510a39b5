//! # Employee Repository

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use bistro_core::validation::{validate_branch, validate_name, validate_non_negative};
use bistro_core::{Employee, RecordStatus};

use super::parse_column;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct EmployeeRecord {
    id: i64,
    employee_number: String,
    full_name: String,
    branch: String,
    basic_salary_cents: i64,
    allowances_cents: i64,
    gosi_enrolled: bool,
    status: String,
    hired_on: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl EmployeeRecord {
    fn into_employee(self) -> DbResult<Employee> {
        Ok(Employee {
            status: parse_column("status", &self.status)?,
            id: self.id,
            employee_number: self.employee_number,
            full_name: self.full_name,
            branch: self.branch,
            basic_salary_cents: self.basic_salary_cents,
            allowances_cents: self.allowances_cents,
            gosi_enrolled: self.gosi_enrolled,
            hired_on: self.hired_on,
            created_at: self.created_at,
        })
    }
}

const EMPLOYEE_COLUMNS: &str = "id, employee_number, full_name, branch, basic_salary_cents, \
     allowances_cents, gosi_enrolled, status, hired_on, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub employee_number: String,
    pub full_name: String,
    pub branch: String,
    pub basic_salary_cents: i64,
    #[serde(default)]
    pub allowances_cents: i64,
    #[serde(default = "default_gosi_enrolled")]
    pub gosi_enrolled: bool,
    #[serde(default)]
    pub hired_on: Option<NaiveDate>,
}

fn default_gosi_enrolled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeUpdate {
    pub full_name: Option<String>,
    pub branch: Option<String>,
    pub basic_salary_cents: Option<i64>,
    pub allowances_cents: Option<i64>,
    pub gosi_enrolled: Option<bool>,
    pub status: Option<RecordStatus>,
    pub hired_on: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: PgPool,
}

impl EmployeeRepository {
    pub fn new(pool: PgPool) -> Self {
        EmployeeRepository { pool }
    }

    pub async fn list(&self, branch: Option<&str>) -> DbResult<Vec<Employee>> {
        let records = sqlx::query_as::<_, EmployeeRecord>(&format!(
            "SELECT {} FROM employees WHERE ($1::TEXT IS NULL OR branch = $1) \
             ORDER BY employee_number",
            EMPLOYEE_COLUMNS
        ))
        .bind(branch)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(EmployeeRecord::into_employee).collect()
    }

    pub async fn get(&self, id: i64) -> DbResult<Employee> {
        sqlx::query_as::<_, EmployeeRecord>(&format!(
            "SELECT {} FROM employees WHERE id = $1",
            EMPLOYEE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Employee", id))?
        .into_employee()
    }

    pub async fn create(&self, input: &NewEmployee) -> DbResult<Employee> {
        validate_name("employee_number", &input.employee_number)?;
        validate_name("full_name", &input.full_name)?;
        validate_branch(&input.branch)?;
        validate_non_negative("basic_salary_cents", input.basic_salary_cents)?;
        validate_non_negative("allowances_cents", input.allowances_cents)?;

        let employee = sqlx::query_as::<_, EmployeeRecord>(&format!(
            r#"
            INSERT INTO employees
                (employee_number, full_name, branch, basic_salary_cents,
                 allowances_cents, gosi_enrolled, hired_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            EMPLOYEE_COLUMNS
        ))
        .bind(input.employee_number.trim())
        .bind(input.full_name.trim())
        .bind(&input.branch)
        .bind(input.basic_salary_cents)
        .bind(input.allowances_cents)
        .bind(input.gosi_enrolled)
        .bind(input.hired_on)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("employee_number", input.employee_number.trim())
            }
            other => other,
        })?
        .into_employee()?;

        info!(employee_id = employee.id, number = %employee.employee_number, "Employee created");
        Ok(employee)
    }

    pub async fn update(&self, id: i64, update: &EmployeeUpdate) -> DbResult<Employee> {
        if let Some(name) = &update.full_name {
            validate_name("full_name", name)?;
        }
        if let Some(branch) = &update.branch {
            validate_branch(branch)?;
        }
        if let Some(basic) = update.basic_salary_cents {
            validate_non_negative("basic_salary_cents", basic)?;
        }
        if let Some(allowances) = update.allowances_cents {
            validate_non_negative("allowances_cents", allowances)?;
        }

        sqlx::query_as::<_, EmployeeRecord>(&format!(
            r#"
            UPDATE employees SET
                full_name = COALESCE($2, full_name),
                branch = COALESCE($3, branch),
                basic_salary_cents = COALESCE($4, basic_salary_cents),
                allowances_cents = COALESCE($5, allowances_cents),
                gosi_enrolled = COALESCE($6, gosi_enrolled),
                status = COALESCE($7, status),
                hired_on = COALESCE($8, hired_on)
            WHERE id = $1
            RETURNING {}
            "#,
            EMPLOYEE_COLUMNS
        ))
        .bind(id)
        .bind(update.full_name.as_deref().map(str::trim))
        .bind(update.branch.as_deref())
        .bind(update.basic_salary_cents)
        .bind(update.allowances_cents)
        .bind(update.gosi_enrolled)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.hired_on)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Employee", id))?
        .into_employee()
    }
}

/// Active employees of a branch, for building a payroll run.
pub(crate) async fn active_in_branch(
    conn: &mut PgConnection,
    branch: &str,
) -> DbResult<Vec<Employee>> {
    let records = sqlx::query_as::<_, EmployeeRecord>(&format!(
        "SELECT {} FROM employees WHERE branch = $1 AND status = 'active' ORDER BY employee_number",
        EMPLOYEE_COLUMNS
    ))
    .bind(branch)
    .fetch_all(&mut *conn)
    .await?;

    records.into_iter().map(EmployeeRecord::into_employee).collect()
}
