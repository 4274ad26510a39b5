//! Chart of accounts.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use bistro_core::chart::AccountNode;
use bistro_core::{Account, PermissionAction};
use bistro_db::repository::account::{AccountUpdate, NewAccount};
use bistro_db::EnsuredAccount;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::AppState;

const SCREEN: &str = "accounts";

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<Account>>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::View).await?;
    Ok(Json(db.accounts().list().await?))
}

pub async fn tree(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<AccountNode>>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::View).await?;
    Ok(Json(db.accounts().tree().await?))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Account>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::View).await?;
    Ok(Json(db.accounts().get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewAccount>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::Create).await?;
    let account = db.accounts().create(input).await?;
    info!(account_id = account.id, code = %account.code, user_id = auth.user_id, "Account created");
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<AccountUpdate>,
) -> ApiResult<Json<Account>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::Edit).await?;
    Ok(Json(db.accounts().update(id, update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::Delete).await?;
    db.accounts().delete(id).await?;
    info!(account_id = id, user_id = auth.user_id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetParentRequest {
    pub parent_id: Option<i64>,
}

pub async fn set_parent(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<SetParentRequest>,
) -> ApiResult<Json<Account>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::Edit).await?;
    Ok(Json(db.accounts().set_parent(id, request.parent_id).await?))
}

/// Creates missing required accounts and reparents misfiled ones. Admin only.
pub async fn ensure_required(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<EnsuredAccount>>> {
    auth.require_admin()?;
    let db = state.db()?;
    Ok(Json(db.accounts().ensure_required().await?))
}
