use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use bistro_core::{Employee, PermissionAction};
use bistro_db::repository::employee::{EmployeeUpdate, NewEmployee};

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "employees";

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeQuery {
    pub branch: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut query): ApiQuery<EmployeeQuery>,
) -> ApiResult<Json<Vec<Employee>>> {
    let db = state.db()?;
    let branch = scope_branch(&mut query.branch, &auth);
    auth.require(db, SCREEN, &branch, PermissionAction::View).await?;
    Ok(Json(db.employees().list(query.branch.as_deref()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewEmployee>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let db = state.db()?;
    auth.require(db, SCREEN, &input.branch, PermissionAction::Create).await?;
    Ok((StatusCode::CREATED, Json(db.employees().create(&input).await?)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Employee>> {
    let db = state.db()?;
    let employee = db.employees().get(id).await?;
    auth.require(db, SCREEN, &employee.branch, PermissionAction::View).await?;
    Ok(Json(employee))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<EmployeeUpdate>,
) -> ApiResult<Json<Employee>> {
    let db = state.db()?;
    let employee = db.employees().get(id).await?;
    auth.require(db, SCREEN, &employee.branch, PermissionAction::Edit).await?;
    if let Some(target) = update.branch.as_deref() {
        if target != employee.branch {
            auth.require(db, SCREEN, target, PermissionAction::Edit).await?;
        }
    }
    Ok(Json(db.employees().update(id, &update).await?))
}
