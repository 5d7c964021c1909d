//! Passage retrieval: exact cosine ranking and the retriever seam

mod retriever;
mod search;

pub use retriever::{PrecomputedRetriever, Retriever};
pub use search::{cosine_distance, TopK};
