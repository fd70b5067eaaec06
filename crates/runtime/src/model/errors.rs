use std::time::Duration;
use thiserror::Error;

/// Faults talking to the chat backend.
///
/// These never escape [`Backend`](super::Backend) calls; they are logged and
/// folded into a degraded reply.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The daemon could not be reached.
    #[error("connection failed: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body carried an `error` field, e.g. an unknown model.
    #[error("{0}")]
    Api(String),

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(timeout)
        } else {
            ModelError::Network(err.to_string())
        }
    }
}
