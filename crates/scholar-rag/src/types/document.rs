//! Document and passage types with stable identifiers for citations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// An academic document known to the system
///
/// Header metadata comes from the external document-analysis step; the
/// fulltext may arrive later and is attached at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// DOI, when known
    pub doi: Option<String>,
    /// Paper title
    pub title: Option<String>,
    /// Publication year
    pub publication_year: Option<i32>,
    /// Journal or venue
    pub source: Option<String>,
    /// Author names in byline order
    #[serde(default)]
    pub authors: Vec<String>,
    /// Extracted fulltext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulltext: Option<String>,
    /// SHA-256 of the fulltext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Ingestion timestamp
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a new metadata-only document
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            doi: None,
            title: Some(title.into()),
            publication_year: None,
            source: None,
            authors: Vec::new(),
            fulltext: None,
            content_hash: None,
            created_at: Utc::now(),
        }
    }

    /// Set the DOI
    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    /// Set the publication year
    pub fn with_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    /// Set the venue
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the author list
    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    /// Attach fulltext, recording its hash
    pub fn with_fulltext(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.content_hash = Some(content_hash(&text));
        self.fulltext = Some(text);
        self
    }

    /// Resolvable link for the DOI, or empty when there is none
    pub fn doi_url(&self) -> String {
        match self.doi.as_deref() {
            Some(doi) if !doi.is_empty() => format!("https://doi.org/{}", doi),
            _ => String::new(),
        }
    }

    /// First three authors, with an ellipsis when the byline is longer
    pub fn author_summary(&self) -> String {
        let names: Vec<&str> = self
            .authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();

        if names.is_empty() {
            return "N/A".to_string();
        }

        let mut summary = names.iter().take(3).copied().collect::<Vec<_>>().join(", ");
        if names.len() > 3 {
            summary.push_str("...");
        }
        summary
    }
}

/// Hex SHA-256 of a document's fulltext
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable citation identifier of a passage: `<document-uuid>:<chunk-index>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassageId {
    /// Owning document
    pub document_id: Uuid,
    /// 0-based position within the document
    pub chunk_index: u32,
}

impl PassageId {
    pub fn new(document_id: Uuid, chunk_index: u32) -> Self {
        Self {
            document_id,
            chunk_index,
        }
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document_id, self.chunk_index)
    }
}

impl FromStr for PassageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (doc, index) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidRequest(format!("malformed passage id: {}", s)))?;

        let document_id = Uuid::parse_str(doc)
            .map_err(|e| Error::InvalidRequest(format!("malformed passage id {}: {}", s, e)))?;
        let chunk_index = index
            .parse()
            .map_err(|e| Error::InvalidRequest(format!("malformed passage id {}: {}", s, e)))?;

        Ok(Self::new(document_id, chunk_index))
    }
}

impl Serialize for PassageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PassageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A contiguous chunk of a document's text, the unit of embedding and retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    /// Owning document
    pub document_id: Uuid,
    /// 0-based, contiguous within the document
    pub chunk_index: u32,
    /// Chunk text
    pub content: String,
    /// Unit-norm embedding (not serialized in API responses)
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl Passage {
    pub fn new(document_id: Uuid, chunk_index: u32, content: String, embedding: Vec<f32>) -> Self {
        Self {
            document_id,
            chunk_index,
            content,
            embedding,
        }
    }

    /// Composite identifier used for citations
    pub fn id(&self) -> PassageId {
        PassageId::new(self.document_id, self.chunk_index)
    }
}

/// A passage paired with its cosine distance to a query
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    /// The retrieved passage
    pub passage: Passage,
    /// Cosine distance (0.0 is identical direction)
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passage_id_round_trips_through_text() {
        let id = PassageId::new(Uuid::new_v4(), 12);
        let parsed: PassageId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_passage_id_rejects_garbage() {
        assert!("not-an-id".parse::<PassageId>().is_err());
        assert!("abc:1".parse::<PassageId>().is_err());
        assert!(format!("{}:x", Uuid::new_v4()).parse::<PassageId>().is_err());
    }

    #[test]
    fn test_passage_id_orders_by_document_then_index() {
        let doc = Uuid::new_v4();
        let mut ids = vec![
            PassageId::new(doc, 10),
            PassageId::new(doc, 2),
            PassageId::new(doc, 0),
        ];
        ids.sort();
        let indices: Vec<u32> = ids.iter().map(|id| id.chunk_index).collect();
        assert_eq!(indices, vec![0, 2, 10]);
    }

    #[test]
    fn test_author_summary() {
        let doc = Document::new("Planetary boundaries").with_authors(vec![
            "Rockström, J.".to_string(),
            "Steffen, W.".to_string(),
        ]);
        assert_eq!(doc.author_summary(), "Rockström, J., Steffen, W.");

        let long = Document::new("t").with_authors(
            ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect(),
        );
        assert_eq!(long.author_summary(), "A, B, C...");

        assert_eq!(Document::new("t").author_summary(), "N/A");
    }

    #[test]
    fn test_doi_url() {
        let doc = Document::new("t").with_doi("10.1038/461472a");
        assert_eq!(doc.doi_url(), "https://doi.org/10.1038/461472a");
        assert_eq!(Document::new("t").doi_url(), "");
    }
}
