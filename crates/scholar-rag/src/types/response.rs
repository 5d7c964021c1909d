//! Response and history types for RAG queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Passage, PassageId, ScoredPassage};

/// Who asked a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "user_id")]
pub enum Owner {
    /// Unauthenticated caller
    Anonymous,
    /// Authenticated user
    User(i64),
}

impl Owner {
    /// Build from an optional user id
    pub fn from_user_id(user_id: Option<i64>) -> Self {
        match user_id {
            Some(id) => Owner::User(id),
            None => Owner::Anonymous,
        }
    }

    /// Nullable column value
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Owner::Anonymous => None,
            Owner::User(id) => Some(*id),
        }
    }
}

/// Provenance of a retrieved passage kept with an answer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub chunk_id: PassageId,
    pub document_id: Uuid,
    pub distance: f32,
}

/// A retrieved passage as persisted with an answer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub content: String,
    pub metadata: SourceMetadata,
}

impl From<&ScoredPassage> for SourceDocument {
    fn from(scored: &ScoredPassage) -> Self {
        Self {
            content: scored.passage.content.clone(),
            metadata: SourceMetadata {
                chunk_id: scored.passage.id(),
                document_id: scored.passage.document_id,
                distance: scored.distance,
            },
        }
    }
}

impl From<&SourceDocument> for ScoredPassage {
    /// Snapshot passages carry no embedding
    fn from(source: &SourceDocument) -> Self {
        Self {
            passage: Passage::new(
                source.metadata.document_id,
                source.metadata.chunk_id.chunk_index,
                source.content.clone(),
                Vec::new(),
            ),
            distance: source.metadata.distance,
        }
    }
}

/// One persisted question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Record ID
    pub id: Uuid,
    /// Who asked
    pub owner: Owner,
    /// The question as asked
    pub query: String,
    /// Synthesized answer text
    pub answer: String,
    /// Passages the answer cites, a subset of `source_documents`
    pub cited: Vec<PassageId>,
    /// All passages retrieved for the question, in rank order
    pub source_documents: Vec<SourceDocument>,
    /// When the exchange happened
    pub created_at: DateTime<Utc>,
}

impl AnswerRecord {
    /// Create a new record stamped with the current time
    pub fn new(
        owner: Owner,
        query: impl Into<String>,
        answer: impl Into<String>,
        cited: Vec<PassageId>,
        source_documents: Vec<SourceDocument>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            query: query.into(),
            answer: answer.into(),
            cited,
            source_documents,
            created_at: Utc::now(),
        }
    }
}

/// Short listing entry for a user's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

impl From<&AnswerRecord> for HistoryEntry {
    fn from(record: &AnswerRecord) -> Self {
        Self {
            id: record.id,
            query: record.query.clone(),
            created_at: record.created_at,
        }
    }
}

/// Presentation view of one source document for an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleView {
    /// Document ID
    pub id: Uuid,
    /// DOI or "N/A"
    pub external_identifier: String,
    /// Title or "N/A"
    pub title: String,
    /// Publication year or "N/A"
    pub year: String,
    /// Venue or "N/A"
    pub source: String,
    /// DOI link, empty when unknown
    pub url: String,
    /// Up to three authors, "..." appended when truncated
    pub author_summary: String,
    /// Passages of this document the answer cites
    pub used_passage_texts: Vec<String>,
    /// Retrieved passages of this document the answer does not cite
    pub unused_passage_texts: Vec<String>,
}

/// Full answer to a query as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    /// The question as asked
    pub query: String,
    /// Synthesized answer text
    pub answer: String,
    /// Source documents in order of first retrieval
    pub articles: Vec<ArticleView>,
    /// ID of the persisted answer record
    pub record_id: Uuid,
}
