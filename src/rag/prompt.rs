//! Model-mode routing and prompt construction for the generation engine.

use serde::{Deserialize, Serialize};

/// Which generation model answers the query. The caller picks a mode;
/// the mapping to concrete model names lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    /// Small, low-latency model.
    Fast,
    /// Larger reasoning model.
    Reasoning,
    /// Middle ground.
    Goldilocks,
}

impl ModelMode {
    pub fn model_name(self) -> &'static str {
        match self {
            ModelMode::Fast => "llama3.2",
            ModelMode::Reasoning => "deepseek-r1:7b",
            ModelMode::Goldilocks => "phi4",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelMode::Fast => "fast",
            ModelMode::Reasoning => "reasoning",
            ModelMode::Goldilocks => "goldilocks",
        }
    }

    /// Parse a request-supplied mode string. Anything unrecognized
    /// falls through to `Goldilocks`.
    pub fn parse(value: &str) -> Self {
        match value {
            "fast" => ModelMode::Fast,
            "reasoning" => ModelMode::Reasoning,
            _ => ModelMode::Goldilocks,
        }
    }
}

impl Default for ModelMode {
    fn default() -> Self {
        ModelMode::Fast
    }
}

/// Build the generation prompt: retrieved context plus the question,
/// with instructions to answer strictly from the context.
pub fn build_prompt(patient_id: &str, context: &str, question: &str) -> String {
    format!(
        "You are an AI assistant answering medical queries from a physician \
         for patient {patient_id}. Strictly use only the context below to \
         answer. If the answer is not explicitly supported, respond with \
         \"Insufficient info to answer.\" and indicate what extra info is \
         needed.\n\nContext:\n{context}\n\nQuestion:\n{question}\n\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_map_to_expected_models() {
        assert_eq!(ModelMode::Fast.model_name(), "llama3.2");
        assert_eq!(ModelMode::Reasoning.model_name(), "deepseek-r1:7b");
        assert_eq!(ModelMode::Goldilocks.model_name(), "phi4");
    }

    #[test]
    fn unknown_mode_string_defaults_to_goldilocks() {
        assert_eq!(ModelMode::parse("fast"), ModelMode::Fast);
        assert_eq!(ModelMode::parse("reasoning"), ModelMode::Reasoning);
        assert_eq!(ModelMode::parse("goldilocks"), ModelMode::Goldilocks);
        assert_eq!(ModelMode::parse("turbo"), ModelMode::Goldilocks);
        assert_eq!(ModelMode::parse(""), ModelMode::Goldilocks);
    }

    #[test]
    fn mode_round_trips_through_serde() {
        let json = serde_json::to_string(&ModelMode::Reasoning).unwrap();
        assert_eq!(json, "\"reasoning\"");
        let back: ModelMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelMode::Reasoning);
    }

    #[test]
    fn prompt_embeds_all_parts() {
        let prompt = build_prompt("P1", "Section: labs\nGlucose 95", "glucose level?");
        assert!(prompt.contains("patient P1"));
        assert!(prompt.contains("Section: labs\nGlucose 95"));
        assert!(prompt.contains("Question:\nglucose level?"));
        assert!(prompt.ends_with("Answer:"));
    }
}
