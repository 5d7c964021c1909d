//! Answer history endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AnswerView, HistoryEntry, HistoryParams, Owner};

/// GET /api/history?user_id= - List an owner's questions, newest first
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>> {
    let owner = Owner::from_user_id(params.user_id);
    let store = state.store().clone();

    let records = tokio::task::spawn_blocking(move || store.list_answer_records(owner)).await??;
    Ok(Json(records.iter().map(HistoryEntry::from).collect()))
}

/// DELETE /api/history?user_id= - Remove all of an owner's records
pub async fn clear_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>> {
    let owner = Owner::from_user_id(params.user_id);
    let store = state.store().clone();

    let deleted = tokio::task::spawn_blocking(move || store.clear_answer_records(owner)).await??;
    tracing::info!("Cleared {} history records for {:?}", deleted, owner);

    Ok(Json(json!({ "deleted": deleted })))
}

/// GET /api/history/:id - A stored answer rendered as it was first shown
pub async fn get_history_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnswerView>> {
    Ok(Json(state.search().recall(id).await?))
}

/// DELETE /api/history/:id
pub async fn delete_history_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let store = state.store().clone();

    if tokio::task::spawn_blocking(move || store.delete_answer_record(id)).await?? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::RecordNotFound(id.to_string()))
    }
}
