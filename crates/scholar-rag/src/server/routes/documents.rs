//! Document registration and fulltext ingestion endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::IngestOutcome;
use crate::server::state::AppState;
use crate::types::{AttachFulltextRequest, Document, RegisterDocumentRequest};

/// Result of registering or filling a document
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub document: Document,
    /// Present when fulltext was ingested by this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestOutcome>,
}

/// POST /api/documents - Register a document, ingesting its fulltext if given
pub async fn register_document(
    State(state): State<AppState>,
    Json(request): Json<RegisterDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    let mut document = Document {
        id: Uuid::new_v4(),
        doi: request.doi.filter(|d| !d.trim().is_empty()),
        title: request.title,
        publication_year: request.publication_year,
        source: request.source,
        authors: request.authors,
        fulltext: None,
        content_hash: None,
        created_at: chrono::Utc::now(),
    };

    if let Some(text) = request.fulltext.filter(|t| !t.trim().is_empty()) {
        document = document.with_fulltext(text);
    }

    let store = state.store().clone();
    let to_insert = document.clone();
    tokio::task::spawn_blocking(move || store.insert_document(&to_insert)).await??;

    tracing::info!(
        "Registered document {} ({})",
        document.id,
        document.title.as_deref().unwrap_or("untitled")
    );

    let ingest = match document.fulltext.as_deref() {
        Some(text) => Some(state.ingest().embed_document(document.id, text).await),
        None => None,
    };

    // Passages are served from the store; keep the response small
    document.fulltext = None;

    Ok((StatusCode::CREATED, Json(DocumentResponse { document, ingest })))
}

/// POST /api/documents/:id/fulltext - Attach fulltext once and ingest it
pub async fn attach_fulltext(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachFulltextRequest>,
) -> Result<Json<DocumentResponse>> {
    if request.fulltext.trim().is_empty() {
        return Err(Error::InvalidRequest("fulltext must not be empty".to_string()));
    }

    let store = state.store().clone();
    let text = request.fulltext.clone();
    let mut document = tokio::task::spawn_blocking(move || {
        store.attach_fulltext(id, &text)?;
        store
            .get_document(id)?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    })
    .await??;

    let outcome = state.ingest().embed_document(id, &request.fulltext).await;
    document.fulltext = None;

    Ok(Json(DocumentResponse {
        document,
        ingest: Some(outcome),
    }))
}

/// POST /api/documents/:id/ingest - Re-run ingest over the stored fulltext
///
/// Recovers documents whose first ingest failed; repeating it on a stored
/// document rewrites the same passages.
pub async fn reingest_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>> {
    let store = state.store().clone();
    let mut document = tokio::task::spawn_blocking(move || store.get_document(id))
        .await??
        .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

    let fulltext = document.fulltext.take().ok_or_else(|| {
        Error::InvalidRequest(format!("document {} has no fulltext to ingest", id))
    })?;

    tracing::info!("Re-ingesting document {}", id);
    let outcome = state.ingest().embed_document(id, &fulltext).await;

    Ok(Json(DocumentResponse {
        document,
        ingest: Some(outcome),
    }))
}

/// GET /api/documents/:id - Header metadata and passage count
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let store = state.store().clone();
    let (document, passages) = tokio::task::spawn_blocking(move || {
        let document = store
            .get_document(id)?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        let passages = store.passages_for_document(id)?.len();
        Ok::<_, Error>((document, passages))
    })
    .await??;

    let document = Document {
        fulltext: None,
        ..document
    };

    Ok(Json(serde_json::json!({
        "document": document,
        "passages": passages,
    })))
}
