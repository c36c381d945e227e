//! The two operations the core exposes to its transport layer:
//! `load_patient` and `answer_query`, plus the convenience wrapper that
//! hands assembled context to a generation engine.
//!
//! `PatientRagService` is an explicit object: construct it once and
//! share it by reference across request handlers. Per-patient state
//! lives in its `PatientIndexCache`; see that module for the
//! concurrency contract.

use serde::Serialize;
use thiserror::Error;

use crate::assemble::RecordAssembler;
use crate::crypto::{FieldCodec, FieldCodecError};
use crate::db::{RecordStore, StoreError};
use crate::index::{CacheError, PatientIndex, PatientIndexCache, SectionIndex};
use crate::models::RetrievalHit;
use crate::rag::{
    assemble_context, build_prompt, rank, AssembledContext, LlmGenerate, ModelMode, RagError,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Patient index not built: call load_patient first")]
    IndexNotBuilt,

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Field codec error: {0}")]
    Codec(#[from] FieldCodecError),

    #[error("Generation error: {0}")]
    Generation(#[from] RagError),

    #[error("Internal lock error")]
    LockPoisoned,
}

impl From<CacheError> for ServiceError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::NotBuilt(_) => ServiceError::IndexNotBuilt,
            CacheError::LockPoisoned => ServiceError::LockPoisoned,
        }
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub sections: usize,
    pub passages: usize,
}

/// Outcome of a query against a loaded patient.
#[derive(Debug, Clone, Serialize)]
pub enum QueryOutcome {
    Answer {
        context: String,
        hits: Vec<RetrievalHit>,
    },
    /// The index was searchable but nothing cleared the relevance cut.
    InsufficientContext,
}

/// Outcome of a query that went on to the generation engine.
#[derive(Debug, Clone, Serialize)]
pub enum GeneratedAnswer {
    Text(String),
    InsufficientContext,
}

pub struct PatientRagService<S: RecordStore> {
    store: S,
    codec: FieldCodec,
    cache: PatientIndexCache,
}

impl<S: RecordStore> PatientRagService<S> {
    pub fn new(store: S, codec: FieldCodec) -> Self {
        Self {
            store,
            codec,
            cache: PatientIndexCache::new(),
        }
    }

    /// Load (or reload) a patient: read every section, decrypt and
    /// normalize the rows, build the per-section indices, and atomically
    /// replace the cache entry. A patient with zero rows across all
    /// sections is `PatientNotFound`, and the prior cache state, built
    /// or absent, is left untouched.
    ///
    /// The record-store reads block on I/O while holding only this
    /// patient's build slot; loads for other patients proceed unaffected.
    pub fn load_patient(&self, patient_id: &str) -> Result<LoadSummary, ServiceError> {
        let patient_id = validated(patient_id, "patient_id")?;

        let index = self.cache.build_with(patient_id, || {
            self.build_index(patient_id)
        })?;

        let summary = LoadSummary {
            sections: index.len(),
            passages: index.sections().map(|s| s.len()).sum(),
        };
        tracing::info!(
            sections = summary.sections,
            passages = summary.passages,
            "Patient index built"
        );
        Ok(summary)
    }

    fn build_index(&self, patient_id: &str) -> Result<PatientIndex, ServiceError> {
        // Store lookup key: deterministic encryption of the normalized id
        let encrypted_id = self.codec.encrypt(patient_id)?;
        let assembler = RecordAssembler::new(&self.codec);

        let mut index = PatientIndex::new();
        for section in self.store.section_names()? {
            let rows = self.store.read_section(&section, &encrypted_id)?;
            if rows.is_empty() {
                continue;
            }
            let records = assembler.assemble_section(&section, rows);
            index.insert(SectionIndex::build(&records.name, &records.records));
        }

        if index.is_empty() {
            return Err(ServiceError::PatientNotFound);
        }
        Ok(index)
    }

    /// Answer a query from the cached index. Pure read: never mutates
    /// the cache, and holds no cache lock once the index handle is out.
    /// A patient with no completed build yields `IndexNotBuilt`.
    pub fn answer_query(
        &self,
        patient_id: &str,
        query: &str,
    ) -> Result<QueryOutcome, ServiceError> {
        let patient_id = validated(patient_id, "patient_id")?;
        let query = validated(query, "query")?;

        let index = self.cache.get(patient_id)?;
        let hits = rank(&index, query);

        match assemble_context(&hits) {
            AssembledContext::Context(context) => {
                tracing::debug!(hits = hits.len(), "Context assembled");
                Ok(QueryOutcome::Answer { context, hits })
            }
            AssembledContext::Insufficient => Ok(QueryOutcome::InsufficientContext),
        }
    }

    /// Answer a query and hand the assembled context to the generation
    /// engine. Insufficient context short-circuits without calling the
    /// engine. The engine call runs with no cache lock held.
    pub fn answer_with_generator<G: LlmGenerate>(
        &self,
        patient_id: &str,
        query: &str,
        mode: ModelMode,
        generator: &G,
    ) -> Result<GeneratedAnswer, ServiceError> {
        let outcome = self.answer_query(patient_id, query)?;
        let context = match outcome {
            QueryOutcome::Answer { context, .. } => context,
            QueryOutcome::InsufficientContext => {
                return Ok(GeneratedAnswer::InsufficientContext)
            }
        };

        let prompt = build_prompt(patient_id, &context, query);
        let text = generator.generate(mode.model_name(), &prompt)?;
        Ok(GeneratedAnswer::Text(text))
    }

    /// Whether a successful load has completed for this id.
    pub fn is_loaded(&self, patient_id: &str) -> bool {
        self.cache.is_built(patient_id)
    }

    pub fn cache(&self) -> &PatientIndexCache {
        &self.cache
    }
}

fn validated<'a>(value: &'a str, field: &str) -> Result<&'a str, ServiceError> {
    if value.trim().is_empty() {
        Err(ServiceError::Validation(format!("missing '{field}'")))
    } else {
        Ok(value)
    }
}
