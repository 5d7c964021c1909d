//! Document ingestion: recursive chunking and the embed-and-store pipeline

mod chunker;
mod pipeline;

pub use chunker::RecursiveChunker;
pub use pipeline::{IngestOutcome, IngestPipeline};
