use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `connected`, `unreachable` or `not_configured`
    pub database: &'static str,
    pub version: &'static str,
}

/// Liveness plus a `SELECT 1` against the database. Public.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match &state.db {
        None => (StatusCode::OK, "not_configured"),
        Some(db) if db.health_check().await => (StatusCode::OK, "connected"),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, "unreachable"),
    };

    (
        status,
        Json(HealthResponse {
            status: if status == StatusCode::OK { "ok" } else { "degraded" },
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
