//! Vector index trait for nearest-passage search

use async_trait::async_trait;
use uuid::Uuid;
use crate::error::Result;
use crate::types::ScoredPassage;

/// Trait for cosine-distance search over stored passages
///
/// Implementations:
/// - `LocalVectorIndex`: exact scan over the SQLite passage store
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The `k` passages closest to `query`, ascending by distance
    ///
    /// Ties are broken by passage id so equal inputs give equal output.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        self.search_filtered(query, k, None).await
    }

    /// Like [`VectorIndex::search`], restricted to the given documents
    async fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        documents: Option<&[Uuid]>,
    ) -> Result<Vec<ScoredPassage>>;

    /// Number of searchable passages
    async fn len(&self) -> Result<usize>;

    /// Check if the index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}
