//! Client error types.

use reckon_proto::{Fault, FrameError, TransportError};
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting or talking to the server failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Request could not be framed or the reply could not be decoded.
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),

    /// Server raised a fault.
    #[error("server fault: {0}")]
    Fault(#[from] Fault),

    /// Server closed the connection while a call was outstanding.
    #[error("connection closed by server")]
    Closed,

    /// Response answered a different call.
    #[error("call id mismatch: expected {expected}, got {actual}")]
    CallIdMismatch {
        /// Id of the outstanding call.
        expected: u32,
        /// Id carried by the response.
        actual: u32,
    },

    /// Reply shape does not fit the call.
    #[error("unexpected reply to {method}: {reply}")]
    UnexpectedReply {
        /// Method that was called.
        method: &'static str,
        /// Debug rendering of the reply.
        reply: String,
    },

    /// Server declined the search configuration.
    #[error("search configuration declined")]
    InitDeclined,

    /// Server did not accept the submitted summary.
    #[error("summary rejected by server")]
    SummaryRejected,
}

impl ClientError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors mean the connection or the session can no longer be
    /// trusted. A rejected summary or declined configuration leaves the
    /// session usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_)
            | Self::Frame(_)
            | Self::Closed
            | Self::CallIdMismatch { .. }
            | Self::UnexpectedReply { .. } => true,

            Self::Fault(fault) => !fault.is_recoverable(),

            Self::InitDeclined | Self::SummaryRejected => false,
        }
    }
}
