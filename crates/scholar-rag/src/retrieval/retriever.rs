//! Retrieval seam between a question and its candidate passages

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ScoredPassage;

/// Produces ranked passages for a question
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Passages relevant to `query`, ascending by distance
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredPassage>>;
}

/// Returns a fixed result set, for callers that already ran the search
pub struct PrecomputedRetriever {
    passages: Vec<ScoredPassage>,
}

impl PrecomputedRetriever {
    pub fn new(passages: Vec<ScoredPassage>) -> Self {
        Self { passages }
    }
}

#[async_trait]
impl Retriever for PrecomputedRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Vec<ScoredPassage>> {
        Ok(self.passages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Passage;

    #[tokio::test]
    async fn test_precomputed_retriever_ignores_query() {
        let passage = Passage::new(uuid::Uuid::new_v4(), 0, "text".to_string(), vec![1.0]);
        let retriever = PrecomputedRetriever::new(vec![ScoredPassage {
            passage,
            distance: 0.25,
        }]);

        let a = retriever.retrieve("one").await.unwrap();
        let b = retriever.retrieve("two").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].passage, b[0].passage);
        assert_eq!(a[0].distance, 0.25);
    }
}
