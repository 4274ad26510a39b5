//! Journal entries.
//!
//! Manual entries arrive as lines naming accounts by id or code; the
//! repository validates balance before anything is written.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use bistro_core::journal::{JournalDraft, JournalLine};
use bistro_core::{EntryReference, JournalEntry, PermissionAction};
use bistro_db::{JournalFilter, ReferenceTarget};

use super::scope_branch;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

const SCREEN: &str = "journal";

#[derive(Debug, Deserialize)]
pub struct NewJournalEntry {
    pub description: String,
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    #[serde(default)]
    pub branch: Option<String>,
    pub lines: Vec<JournalLine>,
    /// Post immediately instead of saving a draft.
    #[serde(default)]
    pub post: bool,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut filter): ApiQuery<JournalFilter>,
) -> ApiResult<Json<Vec<JournalEntry>>> {
    let db = state.db()?;
    let branch = scope_branch(&mut filter.branch, &auth);
    auth.require(db, SCREEN, &branch, PermissionAction::View).await?;
    Ok(Json(db.journal().list(&filter).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewJournalEntry>,
) -> ApiResult<(StatusCode, Json<JournalEntry>)> {
    let db = state.db()?;
    let branch = input.branch.unwrap_or_else(|| auth.branch.clone());
    auth.require(db, SCREEN, &branch, PermissionAction::Create).await?;

    let draft = JournalDraft {
        description: input.description,
        reference: EntryReference::Manual,
        entry_date: input.entry_date,
        branch: Some(branch),
        lines: input.lines,
    };
    let entry = db.journal().create_entry(&draft, input.post).await?;
    info!(
        entry_id = entry.id,
        number = %entry.entry_number,
        status = %entry.status,
        user_id = auth.user_id,
        "Manual journal entry created"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<JournalEntry>> {
    let db = state.db()?;
    let entry = db.journal().get(id).await?;
    auth.require(db, SCREEN, &entry.branch, PermissionAction::View).await?;
    Ok(Json(entry))
}

/// The business document the entry was generated from.
pub async fn source(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ReferenceTarget>> {
    let db = state.db()?;
    let entry = db.journal().get(id).await?;
    auth.require(db, SCREEN, &entry.branch, PermissionAction::View).await?;
    Ok(Json(db.journal().resolve_reference(entry.reference).await?))
}

/// Deletes a draft entry. Posted entries answer `conflict`.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let db = state.db()?;
    let entry = db.journal().get(id).await?;
    auth.require(db, SCREEN, &entry.branch, PermissionAction::Delete).await?;
    db.journal().delete_entry(id).await?;
    info!(entry_id = id, user_id = auth.user_id, "Draft journal entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn post(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<JournalEntry>> {
    let db = state.db()?;
    let entry = db.journal().get(id).await?;
    auth.require(db, SCREEN, &entry.branch, PermissionAction::Edit).await?;
    let entry = db.journal().post_entry(id).await?;
    info!(entry_id = id, user_id = auth.user_id, "Journal entry posted");
    Ok(Json(entry))
}

/// Posts a mirror entry that cancels a posted one.
pub async fn reverse(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<(StatusCode, Json<JournalEntry>)> {
    let db = state.db()?;
    let entry = db.journal().get(id).await?;
    auth.require(db, SCREEN, &entry.branch, PermissionAction::Create).await?;
    let reversal = db.journal().reverse_entry(id).await?;
    info!(entry_id = id, reversal_id = reversal.id, user_id = auth.user_id, "Journal entry reversed");
    Ok((StatusCode::CREATED, Json(reversal)))
}
