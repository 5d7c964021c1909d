//! Prompt templates for grounded, citation-tagged answers

use crate::types::PassageId;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render passages as tagged fragments, one block per passage
    pub fn build_context(passages: &[(PassageId, String)]) -> String {
        let mut context = String::new();

        for (id, content) in passages {
            context.push_str(&format!(
                "Fragment:\ncontent: {}\nchunk_id: {}\n",
                content, id
            ));
            context.push('\n');
        }

        context
    }

    /// Build the full answer prompt
    ///
    /// The model must answer from the fragments only and reply with exactly
    /// one JSON object carrying the answer and the chunk ids it used.
    pub fn build_answer_prompt(question: &str, passages: &[(PassageId, String)]) -> String {
        format!(
            r#"You are given context fragments (content + chunk id). Use ONLY these fragments to answer the following question.
If the answer isn't supported, return "context not available".

Output MUST be a valid JSON object with this format:
{{
  "response": string  // the answer; "context not available" if the context is empty or insufficient
  "chunk_id_list": [string]  // chunk ids of the fragments directly used to derive the answer; [] if the context is insufficient
}}

Rules:
- Output ONLY the JSON (no prose, no backticks).
- Keep the response concise (<=120 words).
- Include ONLY the chunk ids you actually used; otherwise [].

Context:
{context}
Question: {question}

Answer:
"#,
            context = Self::build_context(passages),
            question = question.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_fragments_are_tagged_with_chunk_ids() {
        let doc = Uuid::new_v4();
        let passages = vec![
            (PassageId::new(doc, 0), "Sea level rose 20 cm.".to_string()),
            (PassageId::new(doc, 1), "Glaciers retreat.".to_string()),
        ];

        let prompt = PromptBuilder::build_answer_prompt("How much did sea level rise?", &passages);

        assert!(prompt.contains(&format!(
            "Fragment:\ncontent: Sea level rose 20 cm.\nchunk_id: {}:0\n",
            doc
        )));
        assert!(prompt.contains(&format!("chunk_id: {}:1", doc)));
        assert!(prompt.contains("Question: How much did sea level rise?"));
        assert!(prompt.contains("context not available"));
        assert!(prompt.contains("\"chunk_id_list\": [string]"));
    }
}
