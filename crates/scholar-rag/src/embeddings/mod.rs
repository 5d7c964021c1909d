//! Text embedding with unit normalization
//!
//! [`TextEmbedder`] is the single entry point used for both passages and
//! queries, so both sides of a similarity comparison go through the same
//! model and the same normalization.

use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, HashEmbedder, OllamaEmbedder};

/// Added to the norm before dividing so zero vectors stay finite
const NORM_EPSILON: f32 = 1e-12;

/// Scale a vector to unit length (`v / (||v|| + 1e-12)`)
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    let scale = 1.0 / (norm + NORM_EPSILON);
    for v in vector.iter_mut() {
        *v *= scale;
    }
}

/// Embedding front-end that validates and normalizes provider output
#[derive(Clone)]
pub struct TextEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
}

impl TextEmbedder {
    /// Wrap a provider; its declared dimensions become the contract
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let dimensions = provider.dimensions();
        Self {
            provider,
            dimensions,
        }
    }

    /// Build the configured backend
    pub fn from_config(embeddings: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = match embeddings.backend {
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(llm, embeddings)?),
            EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(embeddings.dimensions)?),
        };

        tracing::info!(
            "Embedding backend: {} ({} dimensions)",
            provider.name(),
            provider.dimensions()
        );

        Ok(Self::new(provider))
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.provider.health_check().await
    }

    /// Embed texts in order; one unit-norm vector per input
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.provider.embed_batch(texts).await?;

        if vectors.len() != texts.len() {
            return Err(Error::embedding(format!(
                "{} returned {} embeddings for {} texts",
                self.provider.name(),
                vectors.len(),
                texts.len()
            )));
        }

        for vector in vectors.iter_mut() {
            self.check_dimensions(vector)?;
            normalize(vector);
        }

        Ok(vectors)
    }

    /// Embed a single text, typically a query
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = self.provider.embed(text).await?;
        self.check_dimensions(&vector)?;
        normalize(&mut vector);
        Ok(vector)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "{} produced {} dimensions, expected {}",
                self.provider.name(),
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn hash_embedder() -> TextEmbedder {
        TextEmbedder::new(Arc::new(HashEmbedder::new(64).unwrap()))
    }

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_vectors_are_unit_norm() {
        let texts = vec![
            "Permafrost carbon feedback".to_string(),
            "Arctic sea ice decline accelerates".to_string(),
        ];
        let vectors = hash_embedder().embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        for v in &vectors {
            assert_eq!(v.len(), 64);
            assert!((norm(v) - 1.0).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_zero_vector_stays_finite() {
        let vector = hash_embedder().embed_one("!!!").await.unwrap();
        assert!(vector.iter().all(|v| v.is_finite() && *v == 0.0));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = hash_embedder();
        let text = "Nitrogen cycle disruption".to_string();

        let batch = embedder.embed(&[text.clone()]).await.unwrap();
        let single = embedder.embed_one(&text).await.unwrap();
        assert_eq!(batch[0], single);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        assert!(hash_embedder().embed(&[]).await.unwrap().is_empty());
    }

    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 3])
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_error() {
        let embedder = TextEmbedder::new(Arc::new(ShortProvider));
        assert!(matches!(
            embedder.embed_one("x").await,
            Err(Error::Embedding(_))
        ));
    }
}
