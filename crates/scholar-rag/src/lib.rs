//! scholar-rag: question answering over academic papers with passage-level citations
//!
//! Papers are registered with their header metadata, their fulltext is split into
//! overlapping passages and embedded, and questions are answered by a local LLM
//! from the nearest passages. Every answer names the passages it used and is kept
//! in a per-user history.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use service::{PipelineStep, QueryContext, SearchService};
pub use types::{
    AnswerRecord, AnswerView, ArticleView, Document, Owner, Passage, PassageId, QueryRequest,
};
