use axum::extract::State;
use axum::Json;

use bistro_core::{Invoice, PermissionAction};
use bistro_db::repository::invoice::InvoiceFilter;

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "invoices";

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut filter): ApiQuery<InvoiceFilter>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let db = state.db()?;
    let branch = scope_branch(&mut filter.branch, &auth);
    auth.require(db, SCREEN, &branch, PermissionAction::View).await?;
    Ok(Json(db.invoices().list(&filter).await?))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Invoice>> {
    let db = state.db()?;
    let invoice = db.invoices().get(id).await?;
    auth.require(db, SCREEN, &invoice.branch, PermissionAction::View).await?;
    Ok(Json(invoice))
}
