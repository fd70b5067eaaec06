//! Tool server error types.

use std::path::PathBuf;
use std::time::Duration;

use rmcp::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("launch target not found: {}", .0.display())]
    TargetMissing(PathBuf),

    #[error("failed to spawn server: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("server not connected")]
    NotConnected,

    #[error("transport closed")]
    TransportClosed,

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether the transport to the server is gone and a reconnect may help.
    pub fn is_transport_closed(&self) -> bool {
        matches!(self, Self::TransportClosed)
    }
}

impl From<ServiceError> for Error {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::TransportClosed | ServiceError::TransportSend(_) => Self::TransportClosed,
            ServiceError::McpError(data) => Self::Protocol(data.message.to_string()),
            other => Self::Protocol(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_transport_is_retryable() {
        assert!(Error::TransportClosed.is_transport_closed());
        assert!(!Error::NotConnected.is_transport_closed());
        assert!(!Error::Protocol("bad".into()).is_transport_closed());
    }

    #[test]
    fn target_missing_message_names_path() {
        let err = Error::TargetMissing("tools/missing.py".into());
        assert_eq!(err.to_string(), "launch target not found: tools/missing.py");
    }
}
