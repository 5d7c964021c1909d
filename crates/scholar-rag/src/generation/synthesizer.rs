//! Answer synthesis from tagged passages

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::retrieval::Retriever;
use crate::types::PassageId;

use super::cache::LlmCache;
use super::envelope::parse_envelope;
use super::prompt::PromptBuilder;

/// Answer returned when nothing was retrieved
pub const NO_CONTEXT_ANSWER: &str = "The answer is not available in the documents.";

/// Synthesized answer and the passages it cites
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    /// Subset of the supplied ids, in the order they were supplied
    pub cited: Vec<PassageId>,
}

impl Synthesis {
    /// The fixed answer for an empty context
    pub fn no_context() -> Self {
        Self {
            answer: NO_CONTEXT_ANSWER.to_string(),
            cited: Vec::new(),
        }
    }
}

/// Turns a question plus retrieved passages into a grounded answer
pub struct AnswerSynthesizer {
    cache: Arc<LlmCache>,
}

impl AnswerSynthesizer {
    pub fn new(cache: Arc<LlmCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<LlmCache> {
        &self.cache
    }

    /// Ask `model` to answer `query` from `passages` only
    ///
    /// With no passages the backend is not called. A reply that cannot be
    /// parsed yields an empty answer, not an error; an unreachable backend
    /// is an error.
    pub async fn synthesize(
        &self,
        query: &str,
        passages: &[(PassageId, String)],
        model: &str,
    ) -> Result<Synthesis> {
        if passages.is_empty() {
            tracing::debug!("No passages retrieved, skipping generation");
            return Ok(Synthesis::no_context());
        }

        let backend = self.cache.get_or_create(model)?;
        let prompt = PromptBuilder::build_answer_prompt(query, passages);

        let raw = backend.generate(&prompt).await?;
        let envelope = parse_envelope(&raw);

        let requested: HashSet<&str> = envelope
            .chunk_id_list
            .iter()
            .map(|id| id.trim())
            .collect();

        let cited: Vec<PassageId> = passages
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| requested.contains(id.to_string().as_str()))
            .collect();

        if cited.len() < requested.len() {
            tracing::debug!(
                "Dropped {} cited ids that were not among the supplied passages",
                requested.len() - cited.len()
            );
        }

        Ok(Synthesis {
            answer: envelope.response,
            cited,
        })
    }

    /// Retrieve with `retriever`, then synthesize
    pub async fn synthesize_from(
        &self,
        query: &str,
        retriever: &dyn Retriever,
        model: &str,
    ) -> Result<Synthesis> {
        let retrieved = retriever.retrieve(query).await?;
        let passages: Vec<(PassageId, String)> = retrieved
            .into_iter()
            .map(|scored| (scored.passage.id(), scored.passage.content))
            .collect();

        self.synthesize(query, &passages, model).await
    }
}
