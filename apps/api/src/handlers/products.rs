use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use bistro_core::{PermissionAction, Product};
use bistro_db::repository::product::{NewProduct, ProductUpdate};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "products";

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::View).await?;
    Ok(Json(db.products().list(query.include_inactive).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::Create).await?;
    Ok((StatusCode::CREATED, Json(db.products().create(&input).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> ApiResult<Json<Product>> {
    let db = state.db()?;
    auth.require(db, SCREEN, &auth.branch, PermissionAction::Edit).await?;
    Ok(Json(db.products().update(id, &update).await?))
}
