//! Session error types.

use reckon_proto::Fault;
use thiserror::Error;

use crate::session::{Operation, SessionState};

/// Errors from session state machine operations.
///
/// Every error leaves the session state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Login key does not match the username.
    #[error("invalid key: submitted {submitted}, expected {expected}")]
    InvalidKey {
        /// Key the client sent.
        submitted: i32,
        /// Key derived from the username.
        expected: i32,
    },

    /// Operation is not allowed from the current state.
    #[error("{operation} not allowed in state {state}")]
    InvalidTransition {
        /// Attempted operation.
        operation: Operation,
        /// State at the time of the attempt.
        state: SessionState,
    },

    /// Search configuration is unusable.
    #[error("invalid search config: {reason}")]
    InvalidConfig {
        /// What was wrong with it.
        reason: String,
    },

    /// Batch fetch asked for fewer than one item.
    #[error("batch size must be positive, got {0}")]
    InvalidBatchSize(i32),
}

impl From<SessionError> for Fault {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidKey { submitted, expected } => {
                Self::InvalidKey { submitted, expected }
            },
            other => Self::protocol(other.to_string()),
        }
    }
}
