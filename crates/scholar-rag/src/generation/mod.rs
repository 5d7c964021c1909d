//! Answer generation with LLM and citation handling

pub mod cache;
pub mod citation;
pub mod envelope;
pub mod ollama;
pub mod prompt;
pub mod synthesizer;

pub use cache::LlmCache;
pub use citation::{render_articles, resolve, CitationPartition};
pub use envelope::{parse_envelope, Envelope};
pub use ollama::{GenerationOptions, OllamaClient};
pub use prompt::PromptBuilder;
pub use synthesizer::{AnswerSynthesizer, Synthesis, NO_CONTEXT_ANSWER};
