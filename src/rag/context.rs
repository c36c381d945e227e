//! Assembles surviving passages into the context block handed to the
//! generation engine.

use serde::Serialize;

use crate::models::RetrievalHit;

/// Result of context assembly. `Insufficient` is a distinct outcome,
/// not an error: the index was searchable but nothing cleared the
/// relevance cut.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AssembledContext {
    Context(String),
    Insufficient,
}

impl AssembledContext {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AssembledContext::Context(s) => Some(s),
            AssembledContext::Insufficient => None,
        }
    }
}

/// Concatenate surviving passages into labeled per-section blocks,
/// blocks separated by a blank line. Hits arrive already grouped in
/// lexicographic section order (see `ranker::rank`); grouping here
/// preserves that order.
pub fn assemble_context(hits: &[RetrievalHit]) -> AssembledContext {
    if hits.is_empty() {
        return AssembledContext::Insufficient;
    }

    let mut blocks: Vec<String> = Vec::new();
    let mut current_section: Option<&str> = None;

    for hit in hits {
        match blocks.last_mut() {
            Some(block) if current_section == Some(hit.section.as_str()) => {
                block.push('\n');
                block.push_str(&hit.passage);
            }
            _ => {
                blocks.push(format!("Section: {}\n{}", hit.section, hit.passage));
                current_section = Some(hit.section.as_str());
            }
        }
    }

    AssembledContext::Context(blocks.join("\n\n"))
}
