use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use bistro_core::{Partner, PermissionAction};
use bistro_db::repository::partner::{NewPartner, PartnerFilter, PartnerUpdate};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "partners";

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(filter): ApiQuery<PartnerFilter>,
) -> ApiResult<Json<Vec<Partner>>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::View).await?;
    Ok(Json(db.partners().list(&filter).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewPartner>,
) -> ApiResult<(StatusCode, Json<Partner>)> {
    let db = state.db()?;
    let branch = input.branch.clone().unwrap_or_else(|| auth.branch.clone());
    auth.require(db, SCREEN, &branch, PermissionAction::Create).await?;
    Ok((StatusCode::CREATED, Json(db.partners().create(&input).await?)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Partner>> {
    let db = state.db()?;
    let partner = db.partners().get(id).await?;
    auth.require(db, SCREEN, partner.branch.as_deref().unwrap_or(&auth.branch), PermissionAction::View)
        .await?;
    Ok(Json(partner))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<PartnerUpdate>,
) -> ApiResult<Json<Partner>> {
    let db = state.db()?;
    let partner = db.partners().get(id).await?;
    auth.require(db, SCREEN, partner.branch.as_deref().unwrap_or(&auth.branch), PermissionAction::Edit)
        .await?;
    Ok(Json(db.partners().update(id, &update).await?))
}
