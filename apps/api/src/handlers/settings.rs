use axum::extract::State;
use axum::Json;
use serde_json::{Map, Value};
use tracing::info;

use bistro_core::{PermissionAction, Settings};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::AppState;

const SCREEN: &str = "settings";

pub async fn get(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Settings>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::View).await?;
    Ok(Json(db.settings().load().await?))
}

/// Partial update: only the keys present in the body change.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(patch): ApiJson<Map<String, Value>>,
) -> ApiResult<Json<Settings>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::Edit).await?;
    let settings = db.settings().save(&patch).await?;
    info!(keys = ?patch.keys().collect::<Vec<_>>(), user_id = auth.user_id, "Settings updated");
    Ok(Json(settings))
}
