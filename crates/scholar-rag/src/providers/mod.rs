//! Provider abstractions for embeddings, LLM and vector search
//!
//! Trait-based seams let the pipeline run against Ollama in production and
//! against deterministic local backends offline and in tests.

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use hashing::HashEmbedder;
pub use llm::LlmProvider;
pub use local::LocalVectorIndex;
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use vector_store::VectorIndex;
