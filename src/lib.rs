//! Chartvault: encrypted per-patient clinical records with on-demand
//! retrieval indexing.
//!
//! Sensitive fields are enciphered at rest with a deterministic
//! field-level codec ([`crypto::FieldCodec`]); a patient's records are
//! decrypted, normalized, and turned into per-section TF-IDF indices on
//! demand ([`index`]), cached safely under concurrent access
//! ([`index::PatientIndexCache`]), and ranked against free-text clinical
//! questions to assemble context for an external generation engine
//! ([`rag`], [`service`]).

pub mod assemble;
pub mod config;
pub mod crypto;
pub mod db;
pub mod index;
pub mod models;
pub mod rag;
pub mod service;

pub use service::{GeneratedAnswer, LoadSummary, PatientRagService, QueryOutcome, ServiceError};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with `RUST_LOG` or the crate default filter.
/// Call once at process start; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
