//! Scores a query against a patient's cached indices and selects the
//! passages worth handing to the generation engine.

use crate::index::{PatientIndex, SectionIndex};
use crate::models::RetrievalHit;

/// At most this many passages survive per section.
pub const MAX_PASSAGES_PER_SECTION: usize = 3;

/// Passages scoring below this are dropped. The boundary is inclusive:
/// a similarity of exactly 0.1 survives.
pub const RELEVANCE_THRESHOLD: f32 = 0.1;

/// Inclusive relevance cut.
pub fn is_relevant(score: f32) -> bool {
    score >= RELEVANCE_THRESHOLD
}

/// Rank one section's passages against a query: stable descending by
/// similarity (ties keep record order), top 3, threshold cut.
pub fn rank_section(index: &SectionIndex, query: &str) -> Vec<RetrievalHit> {
    let sims = index.similarities(&index.vectorize(query));

    let mut order: Vec<usize> = (0..sims.len()).collect();
    // Stable sort: equal scores keep record order
    order.sort_by(|&a, &b| {
        sims[b]
            .partial_cmp(&sims[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    order
        .into_iter()
        .take(MAX_PASSAGES_PER_SECTION)
        .filter(|&i| is_relevant(sims[i]))
        .map(|i| RetrievalHit {
            section: index.section().to_string(),
            passage: index.passages()[i].clone(),
            score: sims[i],
        })
        .collect()
}

/// Rank every section of a patient's index. Sections are visited in
/// lexicographic order, so the output ordering is deterministic.
pub fn rank(index: &PatientIndex, query: &str) -> Vec<RetrievalHit> {
    index
        .sections()
        .flat_map(|section| rank_section(section, query))
        .collect()
}
