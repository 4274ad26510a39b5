//! Order queries and status changes. Orders always come back with items.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use bistro_core::{Order, OrderStatus, PermissionAction};
use bistro_db::OrderFilter;

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "orders";

/// `GET /api/orders?branch=china_town&table=5&status=DRAFT,OPEN`
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut filter): ApiQuery<OrderFilter>,
) -> ApiResult<Json<Vec<Order>>> {
    let db = state.db()?;
    let branch = scope_branch(&mut filter.branch, &auth);
    auth.require(db, SCREEN, &branch, PermissionAction::View).await?;
    Ok(Json(db.orders().list(&filter).await?))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Order>> {
    let db = state.db()?;
    let order = db.orders().get(id).await?;
    auth.require(db, SCREEN, &order.branch, PermissionAction::View).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<Json<Order>> {
    let db = state.db()?;
    let order = db.orders().get(id).await?;
    auth.require(db, SCREEN, &order.branch, PermissionAction::Edit).await?;

    let updated = db.orders().update_status(id, request.status).await?;
    info!(
        order_id = id,
        from = %order.status,
        to = %updated.status,
        user_id = auth.user_id,
        "Order status changed"
    );
    Ok(Json(updated))
}
