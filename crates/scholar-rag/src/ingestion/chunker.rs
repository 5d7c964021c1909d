//! Recursive character chunking with overlap
//!
//! Text is split at the coarsest separator that occurs in it (paragraphs,
//! then lines, then sentences, then words, then single graphemes). Pieces
//! shorter than the chunk size are merged greedily into chunks, and each new
//! chunk starts with a tail of the previous one of at most `chunk_overlap`
//! characters. Pieces that are still too long are split again with the
//! next finer separator.

use std::collections::VecDeque;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// Separators from coarsest to finest; the empty separator means graphemes
const SEPARATORS: &[&str] = &["\n\n", "\n", SENTENCE_END, " ", ""];

/// Stays with the sentence it closes rather than opening the next one
const SENTENCE_END: &str = ". ";

/// Deterministic recursive text chunker
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    /// Maximum chunk length in characters
    chunk_size: usize,
    /// Maximum carry-over between consecutive chunks in characters
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new chunker
    ///
    /// Fails when `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into ordered, non-empty, trimmed chunks
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();

        // First separator present in the text; the empty one always matches.
        let (separator, finer) = match separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
        {
            Some(i) if separators[i].is_empty() => ("", &separators[..0]),
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &separators[..0]),
        };

        let pieces = split_keeping_separator(text, separator);

        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily join small pieces into chunks, carrying a tail of at most
    /// `chunk_overlap` characters into the next chunk
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window);

                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_joined(&mut chunks, &window);
        chunks
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split at every occurrence of `separator`, keeping the separator at the
/// start of the following piece, or at the end of the preceding one for
/// sentence ends. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.graphemes(true).collect();
    }

    let trailing = separator == SENTENCE_END;
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        let cut = if trailing { idx + separator.len() } else { idx };
        if cut > start {
            pieces.push(&text[start..cut]);
        }
        start = cut;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> RecursiveChunker {
        RecursiveChunker::new(800, 100).unwrap()
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(chunker().chunk("").is_empty());
        assert!(chunker().chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunker().chunk("  Ocean acidification reduces calcification.  ");
        assert_eq!(chunks, vec!["Ocean acidification reduces calcification."]);
    }

    #[test]
    fn test_unbroken_text_splits_with_overlap() {
        let text = "A".repeat(2000);
        let chunks = chunker().chunk(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 800);
        assert_eq!(chunks[1].len(), 800);
        assert_eq!(chunks[2].len(), 600);
    }

    #[test]
    fn test_overlap_carries_tail_of_previous_chunk() {
        let text: String = (0..2000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunker().chunk(&text);

        assert_eq!(chunks[0], text[0..800]);
        assert_eq!(chunks[1], text[700..1500]);
        assert_eq!(chunks[2], text[1400..2000]);
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let first = "word ".repeat(100);
        let second = "term ".repeat(100);
        let text = format!("{}\n\n{}", first.trim(), second.trim());

        let chunks = RecursiveChunker::new(600, 50).unwrap().chunk(&text);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("word"));
        assert!(chunks[0].ends_with("word"));
        assert!(chunks[1].starts_with("term"));
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let sentence = "Global warming shifts species ranges poleward. ";
        let text = sentence.repeat(200).replace("ranges", "ranges\n");
        let chunker = RecursiveChunker::new(300, 40).unwrap();

        for chunk in chunker.chunk(&text) {
            assert!(chunk.chars().count() <= 300, "chunk too long: {}", chunk.len());
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = "Biodiversity loss. ".repeat(300);
        assert_eq!(chunker().chunk(&text), chunker().chunk(&text));
    }

    #[test]
    fn test_multibyte_text_is_measured_in_characters() {
        let text = "é".repeat(1000);
        let chunks = chunker().chunk(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 800);
        assert_eq!(chunks[1].chars().count(), 300);
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        assert!(matches!(RecursiveChunker::new(100, 100), Err(Error::Config(_))));
        assert!(matches!(RecursiveChunker::new(0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_sentence_end_closes_its_sentence() {
        let pieces = split_keeping_separator("One. Two. Three", ". ");
        assert_eq!(pieces, vec!["One. ", "Two. ", "Three"]);

        let text = "First sentence here. Second one follows. Third is last.";
        let chunks = RecursiveChunker::new(40, 0).unwrap().chunk(text);
        assert_eq!(
            chunks,
            vec!["First sentence here.", "Second one follows. Third is last."]
        );
        assert!(chunks.iter().all(|c| !c.starts_with('.')));
    }

    #[test]
    fn test_separator_starts_next_piece() {
        let pieces = split_keeping_separator("a\n\n\n\nb", "\n\n");
        assert_eq!(pieces, vec!["a", "\n\n", "\n\nb"]);
    }
}
