//! Request types for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ask a question over the ingested corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,
    /// Generation model; the configured default when absent
    #[serde(default)]
    pub model: Option<String>,
    /// Passages to retrieve; the configured default when absent
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Authenticated user, anonymous when absent
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Overall time budget for this query in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Restrict retrieval to these documents
    #[serde(default)]
    pub document_ids: Option<Vec<Uuid>>,
}

impl QueryRequest {
    /// Create a new query request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            model: None,
            top_k: None,
            user_id: None,
            timeout_secs: None,
            document_ids: None,
        }
    }

    /// Set the generation model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the number of passages to retrieve
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Search only within the given documents
    pub fn with_documents(mut self, document_ids: Vec<Uuid>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }

    /// Set the asking user
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Register a document's header metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDocumentRequest {
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Fulltext to attach and ingest immediately
    #[serde(default)]
    pub fulltext: Option<String>,
}

/// Attach extracted fulltext to an already registered document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachFulltextRequest {
    pub fulltext: String,
}

/// Select the history of one user, or the anonymous history when absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub user_id: Option<i64>,
}
