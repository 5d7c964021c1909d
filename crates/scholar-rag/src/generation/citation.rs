//! Citation resolution: split retrieved passages into cited and uncited,
//! then group them under their source documents for display

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::types::{ArticleView, Document, PassageId, ScoredPassage};

const NOT_AVAILABLE: &str = "N/A";

/// Retrieved passages partitioned by whether the answer cites them
///
/// Every retrieved passage lands in exactly one side, and each side keeps
/// retrieval order.
#[derive(Debug)]
pub struct CitationPartition<'a> {
    pub used: Vec<&'a ScoredPassage>,
    pub unused: Vec<&'a ScoredPassage>,
}

/// Partition `retrieved` by membership of each passage id in `cited`
pub fn resolve<'a>(retrieved: &'a [ScoredPassage], cited: &[PassageId]) -> CitationPartition<'a> {
    let cited: HashSet<PassageId> = cited.iter().copied().collect();

    let (used, unused) = retrieved
        .iter()
        .partition(|scored| cited.contains(&scored.passage.id()));

    CitationPartition { used, unused }
}

/// Distinct source documents of `retrieved`, in order of first appearance
pub fn source_document_ids(retrieved: &[ScoredPassage]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    retrieved
        .iter()
        .map(|scored| scored.passage.document_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Build one view per source document with its used and unused passages
///
/// `documents` supplies metadata; a source document missing from it still
/// gets a view, with every metadata field shown as "N/A".
pub fn render_articles(
    documents: &[Document],
    retrieved: &[ScoredPassage],
    cited: &[PassageId],
) -> Vec<ArticleView> {
    let partition = resolve(retrieved, cited);
    let by_id: HashMap<Uuid, &Document> = documents.iter().map(|d| (d.id, d)).collect();

    source_document_ids(retrieved)
        .into_iter()
        .map(|document_id| {
            let texts = |side: &[&ScoredPassage]| -> Vec<String> {
                side.iter()
                    .filter(|scored| scored.passage.document_id == document_id)
                    .map(|scored| display_text(&scored.passage.content))
                    .collect()
            };

            let used_passage_texts = texts(partition.used.as_slice());
            let unused_passage_texts = texts(partition.unused.as_slice());

            match by_id.get(&document_id) {
                Some(doc) => ArticleView {
                    id: document_id,
                    external_identifier: or_not_available(doc.doi.as_deref()),
                    title: or_not_available(doc.title.as_deref()),
                    year: doc
                        .publication_year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    source: or_not_available(doc.source.as_deref()),
                    url: doc.doi_url(),
                    author_summary: doc.author_summary(),
                    used_passage_texts,
                    unused_passage_texts,
                },
                None => {
                    tracing::warn!("No metadata for retrieved document {}", document_id);
                    ArticleView {
                        id: document_id,
                        external_identifier: NOT_AVAILABLE.to_string(),
                        title: NOT_AVAILABLE.to_string(),
                        year: NOT_AVAILABLE.to_string(),
                        source: NOT_AVAILABLE.to_string(),
                        url: String::new(),
                        author_summary: NOT_AVAILABLE.to_string(),
                        used_passage_texts,
                        unused_passage_texts,
                    }
                }
            }
        })
        .collect()
}

fn or_not_available(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Passage text safe to drop into a double-quoted markup attribute
fn display_text(content: &str) -> String {
    content.replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Passage;

    fn scored(doc: Uuid, index: u32, content: &str, distance: f32) -> ScoredPassage {
        ScoredPassage {
            passage: Passage::new(doc, index, content.to_string(), vec![]),
            distance,
        }
    }

    #[test]
    fn test_partition_is_complete_and_ordered() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let retrieved = vec![
            scored(a, 3, "a3", 0.1),
            scored(b, 0, "b0", 0.2),
            scored(a, 1, "a1", 0.3),
            scored(b, 4, "b4", 0.4),
        ];
        let cited = vec![PassageId::new(b, 4), PassageId::new(a, 3)];

        let partition = resolve(&retrieved, &cited);

        let used: Vec<&str> = partition.used.iter().map(|s| s.passage.content.as_str()).collect();
        let unused: Vec<&str> = partition
            .unused
            .iter()
            .map(|s| s.passage.content.as_str())
            .collect();
        assert_eq!(used, vec!["a3", "b4"]);
        assert_eq!(unused, vec!["b0", "a1"]);
    }

    #[test]
    fn test_citing_nothing_leaves_everything_unused() {
        let doc = Uuid::new_v4();
        let retrieved = vec![scored(doc, 0, "x", 0.0)];

        let partition = resolve(&retrieved, &[]);
        assert!(partition.used.is_empty());
        assert_eq!(partition.unused.len(), 1);
    }

    #[test]
    fn test_render_articles_groups_by_document() {
        let known = Document::new("Climate tipping points")
            .with_doi("10.1038/d41586-019-03595-0")
            .with_authors(
                ["Lenton", "Rockström", "Gaffney", "Rahmstorf"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            );
        let unknown = Uuid::new_v4();
        let retrieved = vec![
            scored(unknown, 0, "orphan", 0.1),
            scored(known.id, 2, "a \"quoted\" claim", 0.2),
            scored(known.id, 5, "context", 0.3),
        ];

        let articles = render_articles(
            std::slice::from_ref(&known),
            &retrieved,
            &[PassageId::new(known.id, 2)],
        );

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].id, unknown);
        assert_eq!(articles[0].title, "N/A");
        assert_eq!(articles[0].unused_passage_texts, vec!["orphan"]);

        let article = &articles[1];
        assert_eq!(article.external_identifier, "10.1038/d41586-019-03595-0");
        assert_eq!(article.url, "https://doi.org/10.1038/d41586-019-03595-0");
        assert_eq!(article.year, "N/A");
        assert_eq!(article.source, "N/A");
        assert_eq!(article.author_summary, "Lenton, Rockström, Gaffney...");
        assert_eq!(article.used_passage_texts, vec!["a 'quoted' claim"]);
        assert_eq!(article.unused_passage_texts, vec!["context"]);
    }
}
