//! Tolerant parsing of the model's JSON reply
//!
//! Models wrap JSON in fences or prose often enough that the reply is cut
//! from the first `{` to the last `}` before parsing. Anything that still
//! fails to parse becomes an empty envelope rather than an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The generation wire contract: `{"response": ..., "chunk_id_list": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Answer text, trimmed
    pub response: String,
    /// Chunk ids as the model wrote them
    pub chunk_id_list: Vec<String>,
}

/// Extract and normalize the envelope from raw model output
pub fn parse_envelope(raw: &str) -> Envelope {
    let (start, end) = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            tracing::warn!("Model reply contains no JSON object");
            return Envelope::default();
        }
    };

    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(value) => normalize(&value),
        Err(e) => {
            tracing::warn!("Failed to parse model reply as JSON: {}", e);
            Envelope::default()
        }
    }
}

fn normalize(value: &Value) -> Envelope {
    let Some(object) = value.as_object() else {
        return Envelope::default();
    };

    let response = match object.get("response") {
        None | Some(Value::Null) => String::new(),
        Some(v) => stringify(v).trim().to_string(),
    };

    let chunk_id_list = match object.get("chunk_id_list") {
        Some(Value::Array(items)) => items.iter().map(stringify).collect(),
        _ => Vec::new(),
    };

    Envelope {
        response,
        chunk_id_list,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
