//! Reckon wire protocol.
//!
//! Value types shared by the server and the client: catalog items, summaries
//! and the summary accumulator, call envelopes, results, faults, and the frame
//! codec that carries them. The `tokio` feature adds async frame I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod frame;
#[cfg(feature = "tokio")]
pub mod io;
pub mod item;
pub mod message;
pub mod summary;

pub use frame::{Frame, FrameError, FrameHeader, FrameKind, MAX_PAYLOAD_SIZE};
#[cfg(feature = "tokio")]
pub use io::{TransportError, read_frame, write_frame};
pub use item::{Item, ItemA, ItemB, ItemC, ItemKind, ItemKinds, SummaryText, UnknownItemKind};
pub use message::{
    BatchFetchResult, Call, Envelope, Fault, FetchResult, FetchStatus, Reply, service,
};
pub use summary::{Summary, SummaryBuilder};
