pub mod context;
pub mod ollama;
pub mod prompt;
pub mod ranker;

pub use context::*;
pub use ollama::*;
pub use prompt::*;
pub use ranker::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Ollama connection failed: {0}")]
    OllamaConnection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Ollama returned status {status}: {body}")]
    OllamaStatus { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}
