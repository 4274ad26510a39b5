//! Login and current-user endpoints.
//!
//! ```text
//! POST /api/auth/login { email, password }
//!   │
//!   ├── no user with that email ────────► 404 not_found
//!   ├── wrong password ─────────────────► 401 invalid_credentials
//!   ├── user deactivated ───────────────► 401 invalid_credentials
//!   └── ok ─────────────────────────────► 200 { token, token_type, expires_in, user }
//! ```

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bistro_core::permissions::PermissionSet;
use bistro_core::User;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let db = state.db()?;
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::Validation("email and password are required".to_string()));
    }

    let credentials = db
        .users()
        .find_credentials(email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !credentials.verify(&request.password) {
        warn!(user_id = credentials.user.id, "Login failed: wrong password");
        return Err(ApiError::InvalidCredentials);
    }
    if !credentials.user.is_active {
        warn!(user_id = credentials.user.id, "Login failed: user inactive");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.jwt.generate_access_token(&credentials.user)?;
    info!(user_id = credentials.user.id, role = %credentials.user.role, "User logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.jwt.access_lifetime_secs(),
        user: credentials.user,
    }))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub permissions: PermissionSet,
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<MeResponse>> {
    let db = state.db()?;
    let user = db.users().get(auth.user_id).await?;
    if !user.is_active {
        return Err(ApiError::Unauthorized("user is inactive".to_string()));
    }
    let permissions = db.users().permission_set(user.id).await?;
    Ok(Json(MeResponse { user, permissions }))
}
