//! API routes for the RAG server

pub mod documents;
pub mod history;
pub mod query;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::Result;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        // Documents; fulltext bodies can be large
        .route("/documents", post(documents::register_document))
        .route("/documents/:id", get(documents::get_document))
        .route("/documents/:id/fulltext", post(documents::attach_fulltext))
        .route("/documents/:id/ingest", post(documents::reingest_document))
        // Query
        .route("/query", post(query::query))
        // History
        .route(
            "/history",
            get(history::list_history).delete(history::clear_history),
        )
        .route(
            "/history/:id",
            get(history::get_history_record).delete(history::delete_history_record),
        )
        // Generation models
        .route("/models", get(models))
        // Info
        .route("/info", get(info))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// GET /api/models - Generation models selectable per query
async fn models(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let default_model = state.search().default_model();
    let models = state
        .llm_cache()
        .get_or_create(default_model)?
        .list_models()
        .await?;

    Ok(Json(serde_json::json!({
        "default_model": default_model,
        "models": models,
    })))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let store = state.store().clone();
    let stats = tokio::task::spawn_blocking(move || store.stats()).await??;

    Ok(Json(serde_json::json!({
        "name": "scholar-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering over academic papers with passage-level citations",
        "embedding_backend": state.embedder().provider_name(),
        "embedding_dimensions": state.embedder().dimensions(),
        "default_model": state.search().default_model(),
        "top_k": state.search().top_k(),
        "loaded_models": state.llm_cache().len(),
        "searchable_passages": state.search().searchable_passages().await?,
        "stats": stats,
        "endpoints": {
            "POST /api/documents": "Register a paper, optionally with fulltext",
            "GET /api/documents/:id": "Get paper metadata",
            "POST /api/documents/:id/fulltext": "Attach and ingest fulltext",
            "POST /api/documents/:id/ingest": "Re-run ingest over stored fulltext",
            "GET /api/models": "List generation models",
            "POST /api/query": "Ask a question",
            "GET /api/history": "List questions for ?user_id= (anonymous when absent)",
            "DELETE /api/history": "Clear history for ?user_id=",
            "GET /api/history/:id": "Get a stored answer",
            "DELETE /api/history/:id": "Delete a stored answer"
        }
    })))
}
