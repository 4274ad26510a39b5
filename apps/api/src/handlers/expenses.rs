use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use bistro_core::{Expense, PermissionAction};
use bistro_db::repository::expense::{ExpenseFilter, NewExpense};

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "expenses";

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut filter): ApiQuery<ExpenseFilter>,
) -> ApiResult<Json<Vec<Expense>>> {
    let db = state.db()?;
    let branch = scope_branch(&mut filter.branch, &auth);
    auth.require(db, SCREEN, &branch, PermissionAction::View).await?;
    Ok(Json(db.expenses().list(&filter).await?))
}

/// Records a draft expense; nothing reaches the ledger until it is posted.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewExpense>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    let db = state.db()?;
    auth.require(db, SCREEN, &input.branch, PermissionAction::Create).await?;
    let expense = db.expenses().create(&input).await?;
    info!(expense_id = expense.id, total_cents = expense.total_cents, "Expense recorded");
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Expense>> {
    let db = state.db()?;
    let expense = db.expenses().get(id).await?;
    auth.require(db, SCREEN, &expense.branch, PermissionAction::View).await?;
    Ok(Json(expense))
}

pub async fn post(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Expense>> {
    let db = state.db()?;
    let expense = db.expenses().get(id).await?;
    auth.require(db, SCREEN, &expense.branch, PermissionAction::Edit).await?;
    let expense = db.expenses().post(id).await?;
    info!(expense_id = id, entry_id = ?expense.journal_entry_id, user_id = auth.user_id, "Expense posted");
    Ok(Json(expense))
}
