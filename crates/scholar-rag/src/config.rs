//! Configuration for the RAG system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main RAG system configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// SQLite storage configuration
    pub storage: StorageConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: RagConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = RagConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override selected fields from `SCHOLAR_RAG_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SCHOLAR_RAG_OLLAMA_URL") {
            self.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("SCHOLAR_RAG_MODEL") {
            self.llm.default_model = model;
        }
        if let Ok(path) = std::env::var("SCHOLAR_RAG_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Ok(port) = std::env::var("SCHOLAR_RAG_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid SCHOLAR_RAG_PORT: {}", port),
            }
        }
        if let Ok(backend) = std::env::var("SCHOLAR_RAG_EMBEDDINGS") {
            match backend.to_lowercase().as_str() {
                "ollama" => self.embeddings.backend = EmbeddingBackend::Ollama,
                "hash" => self.embeddings.backend = EmbeddingBackend::Hash,
                other => tracing::warn!("Ignoring unknown SCHOLAR_RAG_EMBEDDINGS: {}", other),
            }
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embedding dimensions must be positive".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("top_k must be positive".to_string()));
        }
        if self.retrieval.top_k > self.retrieval.max_top_k {
            return Err(Error::Config(format!(
                "top_k ({}) must not exceed max_top_k ({})",
                self.retrieval.top_k, self.retrieval.max_top_k
            )));
        }
        if self.retrieval.query_timeout_secs > self.retrieval.max_query_timeout_secs {
            return Err(Error::Config(format!(
                "query_timeout_secs ({}) must not exceed max_query_timeout_secs ({})",
                self.retrieval.query_timeout_secs, self.retrieval.max_query_timeout_secs
            )));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Largest accepted request body in bytes (fulltext uploads)
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Which embedding backend to run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama embeddings endpoint
    #[default]
    Ollama,
    /// Offline feature-hashing embedder
    Hash,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend used for both passages and queries
    pub backend: EmbeddingBackend,
    /// Model to use (default: nomic-embed-text)
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text and bge-base)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model used when a query names none
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama3.2:3b".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages retrieved per query
    pub top_k: usize,
    /// Largest `top_k` a request may ask for
    pub max_top_k: usize,
    /// Overall budget for one query in seconds (embedding + search + generation)
    pub query_timeout_secs: u64,
    /// Largest per-request budget a client may ask for
    pub max_query_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_top_k: 50,
            query_timeout_secs: 180,
            max_query_timeout_secs: 900,
        }
    }
}

/// SQLite storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let database_path = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
            .join("scholar-rag")
            .join("scholar.db");

        Self { database_path }
    }
}
