//! Operations for model-based testing.
//!
//! Operations cover every call a client can make. They are generated by
//! proptest or the fuzzer and applied to both the model and the real
//! session.

use arbitrary::Arbitrary;
use reckon_proto::{Item, ItemA, ItemKinds};

/// Calls that can be applied to a session.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// `logIn` with the right or a wrong key.
    LogIn {
        /// Submit the key derived from the username.
        correct_key: bool,
    },

    /// `init` with a kind set and limit.
    Init {
        /// Kind bits; only the low three are meaningful.
        kinds: u8,
        /// Store limit, possibly non-positive.
        limit: i8,
    },

    /// `fetch`.
    Fetch,

    /// `fetchBatch` with a possibly non-positive count.
    FetchBatch {
        /// Requested batch size.
        count: i8,
    },

    /// `saveSummary` with the honest summary or a forged one.
    SaveSummary {
        /// Add a text that was never revealed.
        tamper: bool,
    },

    /// `logOut`.
    LogOut,
}

impl Operation {
    /// Kind set an `Init` operation asks for.
    pub fn kind_set(kinds: u8) -> ItemKinds {
        ItemKinds::from_bits_truncate(kinds)
    }
}

/// Observable outcome of one operation.
///
/// Pending answers never appear: model runs disable the pending draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Call completed with no value.
    Done,
    /// Single fetch revealed a kind A item.
    Item(ItemA),
    /// Batch fetch revealed items.
    Items(Vec<Item>),
    /// Iteration is exhausted.
    Ended,
    /// Boolean answer.
    Flag(bool),
    /// Login rejected for a wrong key.
    InvalidKey,
    /// Call was out of order or malformed.
    Violation,
}
