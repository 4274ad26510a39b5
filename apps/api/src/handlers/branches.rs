use axum::extract::State;
use axum::Json;

use bistro_core::Branch;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

/// Every signed-in user may list branches; the POS needs them to pick a till.
pub async fn list(State(state): State<AppState>, _auth: AuthUser) -> ApiResult<Json<Vec<Branch>>> {
    Ok(Json(state.db()?.branches().list().await?))
}
