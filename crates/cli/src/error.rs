//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The config file could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No tool server with this name is configured.
    #[error("unknown tool server '{name}'. Configured: {known:?}")]
    UnknownServer { name: String, known: Vec<String> },

    /// The Ollama daemon did not answer.
    #[error("cannot reach Ollama at {host}. Is `ollama serve` running?")]
    BackendUnreachable { host: String },

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
