use std::env;

/// Application-level constants
pub const APP_NAME: &str = "Chartvault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "chartvault=info".to_string()
}

/// Base URL of the local Ollama instance.
pub fn ollama_base_url() -> String {
    env::var("CHARTVAULT_OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

/// Passphrase the field-codec key is derived from. Must match the key
/// the records were enciphered with at ingest time.
pub fn field_key_passphrase() -> Option<String> {
    env::var("CHARTVAULT_FIELD_KEY").ok()
}
