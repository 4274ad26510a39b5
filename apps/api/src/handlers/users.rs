//! User administration. Admin only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use bistro_core::{Permission, User};
use bistro_db::repository::user::NewUser;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::AppState;

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<User>>> {
    auth.require_admin()?;
    Ok(Json(state.db()?.users().list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    auth.require_admin()?;
    let user = state.db()?.users().create(&input).await?;
    info!(user_id = user.id, role = %user.role, created_by = auth.user_id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub is_active: bool,
}

/// Activates or deactivates a user. Admins cannot deactivate themselves.
pub async fn set_active(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<ActiveRequest>,
) -> ApiResult<Json<User>> {
    auth.require_admin()?;
    if id == auth.user_id && !request.is_active {
        return Err(ApiError::Validation("cannot deactivate your own account".to_string()));
    }
    let user = state.db()?.users().set_active(id, request.is_active).await?;
    info!(user_id = id, is_active = user.is_active, changed_by = auth.user_id, "User activation changed");
    Ok(Json(user))
}

pub async fn permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Permission>>> {
    auth.require_admin()?;
    let db = state.db()?;
    // 404 for unknown users rather than an empty list
    db.users().get(id).await?;
    Ok(Json(db.users().permissions(id).await?))
}

/// Replaces the user's grants with the body.
pub async fn set_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(grants): ApiJson<Vec<Permission>>,
) -> ApiResult<Json<Vec<Permission>>> {
    auth.require_admin()?;
    let saved = state.db()?.users().set_permissions(id, &grants).await?;
    info!(user_id = id, grants = saved.len(), changed_by = auth.user_id, "Permissions replaced");
    Ok(Json(saved))
}
