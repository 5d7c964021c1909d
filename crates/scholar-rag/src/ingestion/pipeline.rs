//! Ingest pipeline: chunk a document's fulltext, embed the chunks and store
//! them as passages

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::embeddings::TextEmbedder;
use crate::error::Error;
use crate::storage::PassageStore;
use crate::types::Passage;

use super::chunker::RecursiveChunker;

/// Result of ingesting one document
///
/// Ingest faults are reported here rather than as `Err`, so a bad document
/// never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// All passages were written
    Stored { passages: usize },
    /// The store rejected the write on a uniqueness or foreign-key constraint
    Conflict { reason: String },
    /// Chunking, embedding or storage failed for another reason
    Failed { reason: String },
}

impl IngestOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, IngestOutcome::Stored { .. })
    }
}

/// Chunk → embed → upsert
#[derive(Clone)]
pub struct IngestPipeline {
    chunker: RecursiveChunker,
    embedder: TextEmbedder,
    store: Arc<PassageStore>,
}

impl IngestPipeline {
    pub fn new(chunker: RecursiveChunker, embedder: TextEmbedder, store: Arc<PassageStore>) -> Self {
        Self {
            chunker,
            embedder,
            store,
        }
    }

    /// Ingest with the configured chunker
    pub async fn embed_document(&self, document_id: Uuid, text: &str) -> IngestOutcome {
        self.embed_document_with(document_id, text, &self.chunker).await
    }

    /// Ingest with a caller-supplied chunker
    ///
    /// Re-ingesting a document replaces its passages by `(document_id,
    /// chunk_index)` and drops any trailing passages beyond the new count.
    pub async fn embed_document_with(
        &self,
        document_id: Uuid,
        text: &str,
        chunker: &RecursiveChunker,
    ) -> IngestOutcome {
        let start = std::time::Instant::now();

        let chunks = chunker.chunk(text);
        tracing::debug!(
            "Document {} split into {} chunks (size {}, overlap {})",
            document_id,
            chunks.len(),
            chunker.chunk_size(),
            chunker.chunk_overlap()
        );

        let embeddings = match self.embedder.embed(&chunks).await {
            Ok(embeddings) => embeddings,
            Err(e) => return failed(document_id, e),
        };

        let passages: Vec<Passage> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (content, embedding))| {
                Passage::new(document_id, index as u32, content, embedding)
            })
            .collect();

        let store = self.store.clone();
        let written = tokio::task::spawn_blocking(move || {
            store.upsert_passages(document_id, &passages)
        })
        .await
        .map_err(Error::from)
        .and_then(|result| result);

        match written {
            Ok(count) => {
                tracing::info!(
                    "Stored {} passages for document {} in {:?}",
                    count,
                    document_id,
                    start.elapsed()
                );
                IngestOutcome::Stored { passages: count }
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!("Passage write conflict for document {}: {}", document_id, e);
                IngestOutcome::Conflict {
                    reason: e.to_string(),
                }
            }
            Err(e) => failed(document_id, e),
        }
    }
}

fn failed(document_id: Uuid, err: Error) -> IngestOutcome {
    let chain = anyhow::Error::from(err);
    tracing::error!("Ingest failed for document {}: {:#}", document_id, chain);
    IngestOutcome::Failed {
        reason: format!("{:#}", chain),
    }
}
