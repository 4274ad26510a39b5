//! Payroll runs: compute (draft) ─► post (accrual) ─► pay (settlement).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use bistro_core::{PayrollRun, PermissionAction};
use bistro_db::repository::payroll::NewPayrollRun;

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "payroll";

#[derive(Debug, Default, Deserialize)]
pub struct PayrollQuery {
    pub branch: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut query): ApiQuery<PayrollQuery>,
) -> ApiResult<Json<Vec<PayrollRun>>> {
    let db = state.db()?;
    let branch = scope_branch(&mut query.branch, &auth);
    auth.require(db, SCREEN, &branch, PermissionAction::View).await?;
    Ok(Json(db.payroll().list(query.branch.as_deref(), query.limit).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewPayrollRun>,
) -> ApiResult<(StatusCode, Json<PayrollRun>)> {
    let db = state.db()?;
    auth.require(db, SCREEN, &input.branch, PermissionAction::Create).await?;
    let run = db.payroll().create_run(&input).await?;
    info!(run_id = run.id, period = %run.period, employees = run.items.len(), "Payroll run computed");
    Ok((StatusCode::CREATED, Json(run)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<PayrollRun>> {
    let db = state.db()?;
    let run = db.payroll().get(id).await?;
    auth.require(db, SCREEN, &run.branch, PermissionAction::View).await?;
    Ok(Json(run))
}

pub async fn post(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<PayrollRun>> {
    let db = state.db()?;
    let run = db.payroll().get(id).await?;
    auth.require(db, SCREEN, &run.branch, PermissionAction::Edit).await?;
    let run = db.payroll().post(id).await?;
    info!(run_id = id, entry_id = ?run.journal_entry_id, user_id = auth.user_id, "Payroll posted");
    Ok(Json(run))
}

pub async fn pay(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<PayrollRun>> {
    let db = state.db()?;
    let run = db.payroll().get(id).await?;
    auth.require(db, SCREEN, &run.branch, PermissionAction::Edit).await?;
    let run = db.payroll().pay(id).await?;
    info!(run_id = id, entry_id = ?run.payment_entry_id, user_id = auth.user_id, "Payroll paid");
    Ok(Json(run))
}
