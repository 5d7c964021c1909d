//! Core types for the RAG system

pub mod document;
pub mod query;
pub mod response;

pub use document::{content_hash, Document, Passage, PassageId, ScoredPassage};
pub use query::{AttachFulltextRequest, HistoryParams, QueryRequest, RegisterDocumentRequest};
pub use response::{
    AnswerRecord, AnswerView, ArticleView, HistoryEntry, Owner, SourceDocument, SourceMetadata,
};
