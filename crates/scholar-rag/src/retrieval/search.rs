//! Exact cosine-distance ranking

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::{Passage, PassageId, ScoredPassage};

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`
///
/// A zero vector on either side has distance 1.0 to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0)
}

struct Ranked {
    distance: f32,
    id: PassageId,
    passage: Passage,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Heap slots reserved up front; larger `k` grows on demand
const PREALLOCATE_LIMIT: usize = 256;

/// Bounded collector of the `k` closest passages to a query
///
/// Keeps a max-heap of at most `k` entries, so memory stays `O(k)` however
/// many passages are offered. Ties on distance go to the smaller passage id.
pub struct TopK<'q> {
    query: &'q [f32],
    k: usize,
    heap: BinaryHeap<Ranked>,
    skipped: usize,
}

impl<'q> TopK<'q> {
    pub fn new(query: &'q [f32], k: usize) -> Self {
        Self {
            query,
            k,
            heap: BinaryHeap::with_capacity(k.min(PREALLOCATE_LIMIT) + 1),
            skipped: 0,
        }
    }

    /// Score one passage and keep it if it ranks among the best `k`
    pub fn offer(&mut self, passage: Passage) {
        if self.k == 0 {
            return;
        }
        if passage.embedding.len() != self.query.len() {
            self.skipped += 1;
            return;
        }

        let candidate = Ranked {
            distance: cosine_distance(self.query, &passage.embedding),
            id: passage.id(),
            passage,
        };

        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    /// Passages whose dimensionality did not match the query
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Results ascending by distance
    pub fn into_sorted(self) -> Vec<ScoredPassage> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| ScoredPassage {
                passage: ranked.passage,
                distance: ranked.distance,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn passage(doc: Uuid, index: u32, embedding: Vec<f32>) -> Passage {
        Passage::new(doc, index, format!("p{}", index), embedding)
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_top_k_keeps_closest_in_order() {
        let doc = Uuid::new_v4();
        let mut top = TopK::new(&[1.0, 0.0], 2);
        top.offer(passage(doc, 0, vec![0.0, 1.0]));
        top.offer(passage(doc, 1, vec![1.0, 0.0]));
        top.offer(passage(doc, 2, vec![0.7, 0.7]));
        top.offer(passage(doc, 3, vec![-1.0, 0.0]));

        let results = top.into_sorted();
        let indices: Vec<u32> = results.iter().map(|r| r.passage.chunk_index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(results[0].distance <= results[1].distance);
    }

    #[test]
    fn test_unbounded_k_returns_everything_offered() {
        let doc = Uuid::new_v4();
        let mut top = TopK::new(&[1.0, 0.0], usize::MAX);
        for index in 0..3 {
            top.offer(passage(doc, index, vec![1.0, index as f32]));
        }

        let indices: Vec<u32> = top
            .into_sorted()
            .iter()
            .map(|r| r.passage.chunk_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_break_on_passage_id() {
        let doc = Uuid::new_v4();
        let mut top = TopK::new(&[1.0, 0.0], 2);
        for index in [5, 3, 9, 1] {
            top.offer(passage(doc, index, vec![1.0, 0.0]));
        }

        let indices: Vec<u32> = top
            .into_sorted()
            .iter()
            .map(|r| r.passage.chunk_index)
            .collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn test_mismatched_dimensions_skipped() {
        let mut top = TopK::new(&[1.0, 0.0], 4);
        top.offer(passage(Uuid::new_v4(), 0, vec![1.0, 0.0, 0.0]));
        assert_eq!(top.skipped(), 1);
        assert!(top.into_sorted().is_empty());
    }

    #[test]
    fn test_zero_k_returns_nothing() {
        let mut top = TopK::new(&[1.0], 0);
        top.offer(passage(Uuid::new_v4(), 0, vec![1.0]));
        assert!(top.into_sorted().is_empty());
    }
}
