//! LLM provider trait for answer generation

use async_trait::async_trait;
use crate::error::Result;

/// Trait for a text-generation backend bound to one model
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server with deterministic sampling
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a fully assembled prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;

    /// Models this backend can serve
    ///
    /// Backends without a catalog report only their own model.
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![self.model().to_string()])
    }
}
