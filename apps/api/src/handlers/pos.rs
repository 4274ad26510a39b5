//! POS endpoints used by the till.
//!
//! ```text
//! saveDraft ──► order (draft/open/busy) per branch + table ──► issueInvoice
//!                                                                 │
//!                    invoice + balanced journal entry, order closed ◄┘
//! ```

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use bistro_core::PermissionAction;
use bistro_db::repository::order::{ActiveTable, IssueInvoiceInput, IssuedInvoice};
use bistro_db::{SaveDraftInput, SavedDraft};

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

const SCREEN: &str = "pos";

/// Creates or replaces the table's draft order.
///
/// Items may be sent in the short form `{"id": 212, "qty": 1}`; prices and
/// names come from the product list when omitted.
pub async fn save_draft(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<SaveDraftInput>,
) -> ApiResult<Json<SavedDraft>> {
    let db = state.db()?;
    auth.require(db, SCREEN, input.branch.trim(), PermissionAction::Create).await?;

    let saved = db.orders().save_draft(&input).await?;
    info!(
        order_id = saved.order.id,
        branch = %saved.order.branch,
        table = %saved.order.table_number,
        items = saved.order.items.len(),
        "Draft saved"
    );
    Ok(Json(saved))
}

/// Invoices an active order and closes it.
pub async fn issue_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<IssueInvoiceInput>,
) -> ApiResult<(StatusCode, Json<IssuedInvoice>)> {
    let db = state.db()?;
    let order = db.orders().get(input.order_id).await?;
    auth.require(db, SCREEN, &order.branch, PermissionAction::Create).await?;

    let issued = db.orders().issue_invoice(&input).await?;
    info!(
        order_id = issued.order.id,
        invoice = %issued.invoice.invoice_number,
        total_cents = issued.invoice.total_cents,
        user_id = auth.user_id,
        "Invoice issued"
    );
    Ok((StatusCode::CREATED, Json(issued)))
}

#[derive(Debug, Default, Deserialize)]
pub struct TablesQuery {
    pub branch: Option<String>,
}

/// Tables with an order in session.
pub async fn tables(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut query): ApiQuery<TablesQuery>,
) -> ApiResult<Json<Vec<ActiveTable>>> {
    let db = state.db()?;
    let branch = scope_branch(&mut query.branch, &auth);
    auth.require(db, SCREEN, &branch, PermissionAction::View).await?;
    Ok(Json(db.orders().active_tables(&branch).await?))
}
