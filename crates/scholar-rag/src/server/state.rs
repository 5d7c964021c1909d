//! Application state for the RAG server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::embeddings::TextEmbedder;
use crate::error::Result;
use crate::generation::{AnswerSynthesizer, LlmCache};
use crate::ingestion::{IngestPipeline, RecursiveChunker};
use crate::providers::LocalVectorIndex;
use crate::service::SearchService;
use crate::storage::PassageStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// SQLite store for documents, passages and history
    store: Arc<PassageStore>,
    /// Embedding front-end shared by ingest and search
    embedder: TextEmbedder,
    /// Generation backends per model
    llm_cache: Arc<LlmCache>,
    /// Chunk → embed → upsert
    ingest: IngestPipeline,
    /// Query orchestration
    search: SearchService,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing RAG application state (database: {})",
            config.storage.database_path.display()
        );

        let path = config.storage.database_path.clone();
        let store = Arc::new(tokio::task::spawn_blocking(move || PassageStore::new(path)).await??);
        tracing::info!("Passage store opened");

        let embedder = TextEmbedder::from_config(&config.embeddings, &config.llm)?;
        let llm_cache = Arc::new(LlmCache::ollama(&config.llm)?);
        tracing::info!(
            "Ollama client initialized at {} (default model {})",
            config.llm.base_url,
            config.llm.default_model
        );

        Self::from_parts(config, store, embedder, llm_cache)
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        config: RagConfig,
        store: Arc<PassageStore>,
        embedder: TextEmbedder,
        llm_cache: Arc<LlmCache>,
    ) -> Result<Self> {
        let chunker = RecursiveChunker::from_config(&config.chunking)?;
        let ingest = IngestPipeline::new(chunker, embedder.clone(), store.clone());

        let search = SearchService::new(
            embedder.clone(),
            Arc::new(LocalVectorIndex::new(store.clone())),
            AnswerSynthesizer::new(llm_cache.clone()),
            store.clone(),
            config.retrieval.top_k,
            config.llm.default_model.clone(),
        )
        .with_max_top_k(config.retrieval.max_top_k);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                embedder,
                llm_cache,
                ingest,
                search,
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<PassageStore> {
        &self.inner.store
    }

    pub fn embedder(&self) -> &TextEmbedder {
        &self.inner.embedder
    }

    pub fn llm_cache(&self) -> &Arc<LlmCache> {
        &self.inner.llm_cache
    }

    pub fn ingest(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    pub fn search(&self) -> &SearchService {
        &self.inner.search
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
