//! Financial reports over posted entries.

use axum::extract::State;
use axum::Json;

use bistro_core::report::{AccountStatement, SalesDay, TrialBalance, VatSummary};
use bistro_core::PermissionAction;
use bistro_db::repository::report::ReportPeriod;

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "reports";

async fn authorize(state: &AppState, auth: &AuthUser, period: &mut ReportPeriod) -> ApiResult<()> {
    if let (Some(from), Some(to)) = (period.from, period.to) {
        if from > to {
            return Err(ApiError::Validation("from must not be after to".to_string()));
        }
    }
    let branch = scope_branch(&mut period.branch, auth);
    auth.require(state.db()?, SCREEN, &branch, PermissionAction::View)
        .await
}

pub async fn trial_balance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut period): ApiQuery<ReportPeriod>,
) -> ApiResult<Json<TrialBalance>> {
    authorize(&state, &auth, &mut period).await?;
    Ok(Json(state.db()?.reports().trial_balance(&period).await?))
}

pub async fn account_statement(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(account_id): ApiPath<i64>,
    ApiQuery(mut period): ApiQuery<ReportPeriod>,
) -> ApiResult<Json<AccountStatement>> {
    authorize(&state, &auth, &mut period).await?;
    Ok(Json(
        state.db()?.reports().account_statement(account_id, &period).await?,
    ))
}

pub async fn vat_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut period): ApiQuery<ReportPeriod>,
) -> ApiResult<Json<VatSummary>> {
    authorize(&state, &auth, &mut period).await?;
    Ok(Json(state.db()?.reports().vat_summary(&period).await?))
}

pub async fn sales_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut period): ApiQuery<ReportPeriod>,
) -> ApiResult<Json<Vec<SalesDay>>> {
    authorize(&state, &auth, &mut period).await?;
    Ok(Json(state.db()?.reports().sales_summary(&period).await?))
}
