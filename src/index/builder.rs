//! Builds a ranked-searchable corpus from one section's record sequence.
//!
//! Each record serializes to a single text passage; passages get
//! TF-IDF term weights over a vocabulary seen only in this build, and
//! every passage vector is L2-normalized so cosine similarity against a
//! normalized query vector reduces to a dot product.
//!
//! The weighting matches the defaults of the usual TF-IDF formulation:
//! raw term counts, smoothed inverse document frequency
//! `ln((1 + n) / (1 + df)) + 1`, L2 norm. Tokens are lowercase runs of
//! word characters at least two long.

use std::collections::HashMap;

use crate::models::ClinicalRecord;

/// One section's ordered passages with their term-weight matrix.
#[derive(Debug)]
pub struct SectionIndex {
    section: String,
    passages: Vec<String>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    vectors: Vec<Vec<f32>>,
}

impl SectionIndex {
    /// Build the index for one section. Passage order exactly matches
    /// the record order handed in.
    pub fn build(section: &str, records: &[ClinicalRecord]) -> Self {
        let passages: Vec<String> = records.iter().map(serialize_record).collect();

        // Vocabulary in first-seen order; per-passage term counts
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<HashMap<usize, f32>> = Vec::with_capacity(passages.len());
        for passage in &passages {
            let mut tf: HashMap<usize, f32> = HashMap::new();
            for token in tokenize(passage) {
                let next_id = vocabulary.len();
                let id = *vocabulary.entry(token).or_insert(next_id);
                *tf.entry(id).or_insert(0.0) += 1.0;
            }
            counts.push(tf);
        }

        // Smoothed IDF across the section's passage set
        let n = passages.len() as f32;
        let mut df = vec![0.0f32; vocabulary.len()];
        for tf in &counts {
            for &id in tf.keys() {
                df[id] += 1.0;
            }
        }
        let idf: Vec<f32> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d)).ln() + 1.0)
            .collect();

        // tf·idf, L2-normalized per passage
        let vectors = counts
            .into_iter()
            .map(|tf| {
                let mut v = vec![0.0f32; idf.len()];
                for (id, count) in tf {
                    v[id] = count * idf[id];
                }
                l2_normalize(&mut v);
                v
            })
            .collect();

        Self {
            section: section.to_string(),
            passages,
            vocabulary,
            idf,
            vectors,
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    /// Passages in record order.
    pub fn passages(&self) -> &[String] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Transform free text into a normalized query vector over this
    /// section's vocabulary. Terms absent from the vocabulary contribute
    /// zero weight; a query with no known terms yields the zero vector.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.idf.len()];
        for token in tokenize(text) {
            if let Some(&id) = self.vocabulary.get(&token) {
                v[id] += self.idf[id];
            }
        }
        l2_normalize(&mut v);
        v
    }

    /// Similarity of a query vector against every passage, in passage
    /// order. Both sides are L2-normalized, so this is a dot product.
    pub fn similarities(&self, query: &[f32]) -> Vec<f32> {
        self.vectors
            .iter()
            .map(|v| v.iter().zip(query).map(|(a, b)| a * b).sum())
            .collect()
    }
}

/// Lowercase tokens: runs of `[a-z0-9_]` at least two characters long.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Field-by-field human-readable join, in field insertion order.
/// `"lab_name"` renders as `"Lab name"`; null and empty values are
/// skipped.
fn serialize_record(record: &ClinicalRecord) -> String {
    record
        .iter()
        .filter_map(|(name, value)| {
            let rendered = value.display();
            if rendered.is_empty() {
                None
            } else {
                Some(format!("{}: {}", humanize_field(name), rendered))
            }
        })
        .collect::<Vec<_>>()
        .join(". ")
}

fn humanize_field(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
