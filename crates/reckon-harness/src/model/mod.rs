//! Reference model for model-based testing.
//!
//! The model is a simplified session that captures the protocol's rules
//! without the real store's slot cursor or any locking. It is the oracle the
//! real session is checked against.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Rules not mechanics: Captures WHAT, not HOW
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod session;

pub use operation::{Operation, Outcome};
pub use session::ModelSession;
