//! Query endpoint: grounded answers with passage citations

use axum::{extract::State, Json};
use std::time::Duration;

use crate::error::Result;
use crate::server::state::AppState;
use crate::service::QueryContext;
use crate::types::{AnswerView, QueryRequest};

/// POST /api/query - Answer a question from the ingested papers
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<AnswerView>> {
    tracing::info!("Query: \"{}\"", request.question);

    let retrieval = &state.config().retrieval;
    let timeout = request
        .timeout_secs
        .unwrap_or(retrieval.query_timeout_secs)
        .min(retrieval.max_query_timeout_secs);
    let ctx = QueryContext::new().with_timeout(Duration::from_secs(timeout));

    // A dropped request (client went away) cancels the remaining steps
    let _cancel_on_drop = ctx.cancellation_token().drop_guard();

    let view = state.search().search(&request, &ctx).await?;
    Ok(Json(view))
}
