//! LLM provider backends.

mod ollama;

pub use ollama::{DEFAULT_HOST, OllamaBackend, OllamaBackendBuilder, parse_model_list};
