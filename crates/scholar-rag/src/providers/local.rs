//! Local vector index over the SQLite passage store
//!
//! Search is an exact scan: every stored embedding is scored against the
//! query and the best `k` are kept in a bounded heap.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::retrieval::TopK;
use crate::storage::PassageStore;
use crate::types::ScoredPassage;

use super::vector_store::VectorIndex;

/// Brute-force cosine index reading passages from SQLite
pub struct LocalVectorIndex {
    store: Arc<PassageStore>,
}

impl LocalVectorIndex {
    /// Create from an existing store
    pub fn new(store: Arc<PassageStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        documents: Option<&[Uuid]>,
    ) -> Result<Vec<ScoredPassage>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // PassageStore is sync, scan on the blocking pool
        let store = self.store.clone();
        let query = query.to_vec();
        let filter = documents.map(|d| d.to_vec());

        tokio::task::spawn_blocking(move || {
            let mut top = TopK::new(&query, k);
            store.scan_passages(filter.as_deref(), |passage| top.offer(passage))?;

            if top.skipped() > 0 {
                tracing::warn!(
                    "Skipped {} passages with embedding dimensions other than {}",
                    top.skipped(),
                    query.len()
                );
            }

            Ok(top.into_sorted())
        })
        .await?
    }

    async fn len(&self) -> Result<usize> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.count_passages()).await?
    }

    fn name(&self) -> &str {
        "local-scan"
    }
}
