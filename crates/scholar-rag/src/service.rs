//! Search orchestration: embed the question, retrieve passages, synthesize
//! an answer, resolve citations and persist the exchange
//!
//! A query moves through
//! `Idle → Embedding → Retrieving → Synthesizing → Resolving → Persisted`
//! and ends in `Persisted` or `Failed`. The answer record is written last, so
//! a query that fails or is cancelled leaves nothing behind.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::embeddings::TextEmbedder;
use crate::error::{Error, Result};
use crate::generation::citation::{render_articles, source_document_ids};
use crate::generation::AnswerSynthesizer;
use crate::providers::VectorIndex;
use crate::retrieval::PrecomputedRetriever;
use crate::storage::PassageStore;
use crate::types::{
    AnswerRecord, AnswerView, Owner, QueryRequest, ScoredPassage, SourceDocument,
};

/// Where a query is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Idle,
    Embedding,
    Retrieving,
    Synthesizing,
    Resolving,
    Persisted,
    Failed,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Idle => "idle",
            PipelineStep::Embedding => "embedding",
            PipelineStep::Retrieving => "retrieving",
            PipelineStep::Synthesizing => "synthesizing",
            PipelineStep::Resolving => "resolving",
            PipelineStep::Persisted => "persisted",
            PipelineStep::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Deadline and cancellation shared by every step of one query
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    deadline: Option<tokio::time::Instant>,
    cancel: CancellationToken,
}

impl QueryContext {
    /// No deadline, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Overall budget starting now
    ///
    /// A budget too large to represent as an instant means no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = tokio::time::Instant::now().checked_add(timeout);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this query when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run one step, failing with `Timeout` or `Cancelled` tagged with it
    ///
    /// On timeout or cancellation the step's future is dropped.
    pub async fn run<F, T>(&self, step: PipelineStep, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled { step });
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| Error::Timeout { step })?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled { step }),
            result = bounded => result,
        }
    }
}

/// Composes embedding, retrieval, synthesis and citation resolution
pub struct SearchService {
    embedder: TextEmbedder,
    index: Arc<dyn VectorIndex>,
    synthesizer: AnswerSynthesizer,
    store: Arc<PassageStore>,
    top_k: usize,
    max_top_k: usize,
    default_model: String,
}

impl SearchService {
    pub fn new(
        embedder: TextEmbedder,
        index: Arc<dyn VectorIndex>,
        synthesizer: AnswerSynthesizer,
        store: Arc<PassageStore>,
        top_k: usize,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            synthesizer,
            store,
            top_k,
            max_top_k: RetrievalConfig::default().max_top_k.max(top_k),
            default_model: default_model.into(),
        }
    }

    /// Passages the index can currently search
    pub async fn searchable_passages(&self) -> Result<usize> {
        self.index.len().await
    }

    /// Cap on the per-request `top_k`
    pub fn with_max_top_k(mut self, max_top_k: usize) -> Self {
        self.max_top_k = max_top_k;
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer one question and persist the exchange
    pub async fn search(&self, request: &QueryRequest, ctx: &QueryContext) -> Result<AnswerView> {
        let query = request.question.trim();
        if query.is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".to_string()));
        }
        if let Some(k) = request.top_k.filter(|k| *k > self.max_top_k) {
            return Err(Error::InvalidRequest(format!(
                "top_k ({}) must not exceed {}",
                k, self.max_top_k
            )));
        }

        let start = Instant::now();
        let mut step = PipelineStep::Idle;

        match self.run_steps(query, request, ctx, &mut step).await {
            Ok(view) => {
                tracing::info!(
                    "Answered query in {:?} ({} articles, record {})",
                    start.elapsed(),
                    view.articles.len(),
                    view.record_id
                );
                Ok(view)
            }
            Err(e) => {
                match &e {
                    Error::Cancelled { .. } | Error::Timeout { .. } => {
                        tracing::warn!("Query stopped during {}: {}", step, e)
                    }
                    _ => tracing::error!("Query failed during {}: {:#}", step, e),
                }
                tracing::debug!("Query state: {} -> {}", step, PipelineStep::Failed);
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        query: &str,
        request: &QueryRequest,
        ctx: &QueryContext,
        step: &mut PipelineStep,
    ) -> Result<AnswerView> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let k = request.top_k.unwrap_or(self.top_k);
        let owner = Owner::from_user_id(request.user_id);

        advance(step, PipelineStep::Embedding);
        let vector = ctx
            .run(*step, self.embedder.embed_one(query))
            .await?;

        advance(step, PipelineStep::Retrieving);
        let retrieved = ctx
            .run(
                *step,
                self.index
                    .search_filtered(&vector, k, request.document_ids.as_deref()),
            )
            .await?;
        tracing::debug!("Retrieved {} passages (k = {})", retrieved.len(), k);

        advance(step, PipelineStep::Synthesizing);
        let retriever = PrecomputedRetriever::new(retrieved.clone());
        let synthesis = ctx
            .run(*step, self.synthesizer.synthesize_from(query, &retriever, model))
            .await?;

        advance(step, PipelineStep::Resolving);
        let document_ids = source_document_ids(&retrieved);
        let store = self.store.clone();
        let documents = ctx
            .run(*step, async move {
                tokio::task::spawn_blocking(move || store.get_documents(&document_ids)).await?
            })
            .await?;
        let articles = render_articles(&documents, &retrieved, &synthesis.cited);

        if ctx.is_cancelled() {
            return Err(Error::Cancelled { step: *step });
        }

        let record = AnswerRecord::new(
            owner,
            query,
            synthesis.answer.clone(),
            synthesis.cited.clone(),
            retrieved.iter().map(SourceDocument::from).collect(),
        );
        let record_id = record.id;

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save_answer_record(&record)).await??;
        advance(step, PipelineStep::Persisted);

        Ok(AnswerView {
            query: query.to_string(),
            answer: synthesis.answer,
            articles,
            record_id,
        })
    }

    /// Rebuild the answer view of a stored record for re-display
    ///
    /// Articles come from the retrieval snapshot and cited ids kept with the
    /// record, joined with the current document metadata.
    pub async fn recall(&self, record_id: Uuid) -> Result<AnswerView> {
        let store = self.store.clone();
        let (record, retrieved, documents) = tokio::task::spawn_blocking(move || {
            let record = store
                .get_answer_record(record_id)?
                .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
            let retrieved: Vec<ScoredPassage> =
                record.source_documents.iter().map(ScoredPassage::from).collect();
            let documents = store.get_documents(&source_document_ids(&retrieved))?;
            Ok::<_, Error>((record, retrieved, documents))
        })
        .await??;

        Ok(AnswerView {
            articles: render_articles(&documents, &retrieved, &record.cited),
            query: record.query,
            answer: record.answer,
            record_id: record.id,
        })
    }
}

fn advance(step: &mut PipelineStep, next: PipelineStep) {
    tracing::debug!("Query state: {} -> {}", step, next);
    *step = next;
}
