//! Blocking Ollama client behind the `LlmGenerate` seam.
//!
//! The generation call is long-latency and happens strictly after
//! context assembly; callers must not hold any cache lock across it
//! (`PatientIndexCache::get` hands out an owned `Arc`, so none is held).

use serde::{Deserialize, Serialize};

use super::RagError;

/// Text generation within the query pipeline. Implemented by the Ollama
/// client in production and by stubs in tests.
pub trait LlmGenerate {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, RagError>;
}

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, RagError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RagError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    /// Default local Ollama instance with a 5-minute timeout.
    pub fn default_local() -> Result<Self, RagError> {
        Self::new(&crate::config::ollama_base_url(), 300)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LlmGenerate for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, RagError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                RagError::OllamaConnection(self.base_url.clone())
            } else if e.is_timeout() {
                RagError::HttpClient(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                RagError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| RagError::HttpClient(e.to_string()))?;
        if !status.is_success() {
            return Err(RagError::OllamaStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: OllamaGenerateResponse = serde_json::from_str(&text)
            .map_err(|e| RagError::ResponseParsing(format!("{e}: {text}")))?;
        Ok(parsed.response)
    }
}
