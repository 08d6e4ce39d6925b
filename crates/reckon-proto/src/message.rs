//! Call envelopes, results and faults.
//!
//! One connection carries three named services. Every request names the
//! service it targets; the receiving side routes on that name.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    item::{Item, ItemA},
    summary::Summary,
};

/// Service names as carried on the wire.
pub mod service {
    /// Login/logout.
    pub const LOGIN: &str = "Login";
    /// Item iteration.
    pub const SEARCH: &str = "Search";
    /// Summary verification.
    pub const REPORTS: &str = "Reports";
}

/// A single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    /// `Login.logIn`
    LogIn {
        /// Account name.
        username: String,
        /// Proof-of-knowledge key.
        key: i32,
    },
    /// `Login.logOut`
    LogOut,
    /// `Search.fetch`
    Fetch,
    /// `Search.fetchBatch`
    FetchBatch {
        /// Number of items requested.
        count: i32,
    },
    /// `Search.init`
    Init {
        /// Kind identifiers to iterate.
        allowed_types: BTreeSet<String>,
        /// Store limit.
        limit: i32,
    },
    /// `Reports.saveSummary`
    SaveSummary {
        /// Client-built summary.
        summary: Summary,
    },
}

impl Call {
    /// Method name as exposed by its service.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::LogIn { .. } => "logIn",
            Self::LogOut => "logOut",
            Self::Fetch => "fetch",
            Self::FetchBatch { .. } => "fetchBatch",
            Self::Init { .. } => "init",
            Self::SaveSummary { .. } => "saveSummary",
        }
    }

    /// Service that offers this call.
    pub fn default_service(&self) -> &'static str {
        match self {
            Self::LogIn { .. } | Self::LogOut => service::LOGIN,
            Self::Fetch | Self::FetchBatch { .. } | Self::Init { .. } => service::SEARCH,
            Self::SaveSummary { .. } => service::REPORTS,
        }
    }
}

/// Request payload: a call addressed to a named service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Target service name.
    pub service: String,
    /// The call itself.
    pub call: Call,
}

impl Envelope {
    /// Address `call` to `service`.
    pub fn new(service: impl Into<String>, call: Call) -> Self {
        Self { service: service.into(), call }
    }

    /// Address `call` to the service that offers it.
    pub fn routed(call: Call) -> Self {
        Self::new(call.default_service(), call)
    }
}

/// Outcome tag of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum FetchStatus {
    /// Nothing happened; retry later.
    Pending = 0,
    /// Payload carries items.
    Item = 1,
    /// Iteration is exhausted.
    Ended = 2,
}

/// Result of `Search.fetch`. Single fetches only ever carry an [`ItemA`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Outcome tag.
    pub status: FetchStatus,
    /// Present iff `status` is [`FetchStatus::Item`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemA>,
}

impl FetchResult {
    /// Retry-later result.
    pub fn pending() -> Self {
        Self { status: FetchStatus::Pending, item: None }
    }

    /// Result carrying one item.
    pub fn item(item: ItemA) -> Self {
        Self { status: FetchStatus::Item, item: Some(item) }
    }

    /// Exhaustion result.
    pub fn ended() -> Self {
        Self { status: FetchStatus::Ended, item: None }
    }
}

/// Result of `Search.fetchBatch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFetchResult {
    /// Outcome tag.
    pub status: FetchStatus,
    /// Present iff `status` is [`FetchStatus::Item`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
}

impl BatchFetchResult {
    /// Retry-later result.
    pub fn pending() -> Self {
        Self { status: FetchStatus::Pending, items: None }
    }

    /// Result carrying a batch.
    pub fn items(items: Vec<Item>) -> Self {
        Self { status: FetchStatus::Item, items: Some(items) }
    }

    /// Exhaustion result.
    pub fn ended() -> Self {
        Self { status: FetchStatus::Ended, items: None }
    }
}

/// Fault raised by a service instead of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Fault {
    /// Login key does not match the username.
    #[error("invalid key: submitted {submitted}, expected {expected}")]
    InvalidKey {
        /// Key the client sent.
        submitted: i32,
        /// Key the server derived from the username.
        expected: i32,
    },

    /// Call is not valid in the session's current state.
    #[error("protocol violation: {reason}")]
    ProtocolViolation {
        /// What was out of order.
        reason: String,
    },

    /// No service registered under this name.
    #[error("unknown service: {name}")]
    UnknownService {
        /// Requested service name.
        name: String,
    },

    /// The named service does not offer the call.
    #[error("service {service} has no method {method}")]
    UnknownMethod {
        /// Requested service name.
        service: String,
        /// Requested method name.
        method: String,
    },
}

impl Fault {
    /// Protocol-violation fault with a reason.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation { reason: reason.into() }
    }

    /// Returns true if the client can recover by retrying differently.
    ///
    /// Only a bad key is recoverable: every other fault is a sequencing or
    /// addressing bug on the client side.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidKey { .. } => true,
            Self::ProtocolViolation { .. }
            | Self::UnknownService { .. }
            | Self::UnknownMethod { .. } => false,
        }
    }
}

/// Response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Call completed with no value.
    Done,
    /// `fetch` result.
    Fetched(FetchResult),
    /// `fetchBatch` result.
    FetchedBatch(BatchFetchResult),
    /// Boolean result (`init`, `saveSummary`).
    Flag(bool),
    /// The call raised a fault.
    Fault(Fault),
}

impl<T: Into<Reply>> From<Result<T, Fault>> for Reply {
    fn from(result: Result<T, Fault>) -> Self {
        result.map_or_else(Self::Fault, Into::into)
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Done
    }
}

impl From<FetchResult> for Reply {
    fn from(result: FetchResult) -> Self {
        Self::Fetched(result)
    }
}

impl From<BatchFetchResult> for Reply {
    fn from(result: BatchFetchResult) -> Self {
        Self::FetchedBatch(result)
    }
}

impl From<bool> for Reply {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}
