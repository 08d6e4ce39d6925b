//! Server error types.

use reckon_proto::{FrameError, TransportError};
use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection's byte stream broke or carried a bad frame.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A reply could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),
}

impl ServerError {
    /// Returns true if the error stops the whole server rather than a single
    /// connection.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Io(_) => true,
            Self::Transport(_) | Self::Protocol(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_not_fatal() {
        assert!(!ServerError::Transport(TransportError::UnexpectedEof).is_fatal());
        assert!(!ServerError::Protocol(FrameError::UnknownKind(9)).is_fatal());
        assert!(ServerError::Config("max_connections must be positive".into()).is_fatal());
    }
}
