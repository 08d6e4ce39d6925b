//! Per-connection session state machine.
//!
//! ```text
//! Created --login--> Opened --configure / first fetch--> Iterated
//!                      |                                   |
//!                      |                      store short  |
//!                      |                                   v
//!                      +------------ logout ------------ Depleted
//!                                      |
//!                                      v
//!                                    Closed
//! ```
//!
//! # Invariants
//!
//! - State only moves forward; `Closed` is terminal
//! - A failed operation leaves every field untouched
//! - `cursor` never decreases
//! - The search config is fixed once the session reaches `Iterated`
//! - The summary is only observable in `Depleted`
//! - Single fetches only reveal kind A items

use std::fmt;

use reckon_proto::{Item, ItemA, ItemKinds, Summary, SummaryBuilder};

use crate::{
    credentials::expected_key,
    error::SessionError,
    store::{Catalog, ItemStore},
};

/// Largest store limit a client may configure. Catalogs are materialized
/// up front, so the limit bounds per-session memory.
pub const MAX_SEARCH_LIMIT: u32 = 100_000;

/// Process-wide connection identifier.
pub type ConnectionId = u64;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionState {
    /// Connection accepted, nobody logged in.
    Created,
    /// Logged in, iteration not started.
    Opened,
    /// Iterating the store.
    Iterated,
    /// Store exhausted; summary available.
    Depleted,
    /// Logged out.
    Closed,
}

impl SessionState {
    /// Upper-case name used in logs and fault messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Opened => "OPENED",
            Self::Iterated => "ITERATED",
            Self::Depleted => "DEPLETED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session operations, named as their RPC counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `logIn`
    Login,
    /// `init`
    Configure,
    /// `fetch`
    FetchOne,
    /// `fetchBatch`
    FetchBatch,
    /// Summary read backing `saveSummary`.
    Summary,
    /// `logOut`
    Logout,
}

impl Operation {
    /// RPC-facing name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "logIn",
            Self::Configure => "init",
            Self::FetchOne => "fetch",
            Self::FetchBatch => "fetchBatch",
            Self::Summary => "getSummary",
            Self::Logout => "logOut",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kinds to iterate and the store limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    allowed: ItemKinds,
    limit: u32,
}

impl SearchConfig {
    /// Validated config. The kind set must be non-empty and the limit in
    /// `1..=MAX_SEARCH_LIMIT`.
    pub fn new(allowed: ItemKinds, limit: u32) -> Result<Self, SessionError> {
        if allowed.is_empty() {
            return Err(SessionError::InvalidConfig { reason: "no item kinds allowed".to_string() });
        }
        if limit == 0 {
            return Err(SessionError::InvalidConfig { reason: "limit must be positive".to_string() });
        }
        if limit > MAX_SEARCH_LIMIT {
            return Err(SessionError::InvalidConfig {
                reason: format!("limit {limit} exceeds {MAX_SEARCH_LIMIT}"),
            });
        }
        Ok(Self { allowed, limit })
    }

    /// Config from wire values (`init` arguments).
    pub fn from_wire<I, S>(allowed_types: I, limit: i32) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = ItemKinds::from_names(allowed_types)
            .map_err(|e| SessionError::InvalidConfig { reason: e.to_string() })?;
        let limit = u32::try_from(limit)
            .map_err(|_| SessionError::InvalidConfig { reason: format!("negative limit {limit}") })?;
        Self::new(allowed, limit)
    }

    /// Allowed kinds.
    pub fn allowed(&self) -> ItemKinds {
        self.allowed
    }

    /// Store limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for SearchConfig {
    /// Config applied when a client fetches without calling `init` first:
    /// kind A only, limit 1.
    fn default() -> Self {
        Self { allowed: ItemKinds::A, limit: 1 }
    }
}

/// Outcome of a fetch that did not fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    /// Items were revealed and folded into the summary.
    Found(T),
    /// Nothing left; the session is (now) depleted.
    Depleted,
}

/// Session state machine.
///
/// Owns the iteration cursor, the summary accumulator and the search config.
/// Handlers drive it; it never performs I/O beyond the store query.
pub struct Session<C: Catalog> {
    id: ConnectionId,
    state: SessionState,
    catalog: C,
    config: SearchConfig,
    store: Option<C::Store>,
    /// Items handed out, as counted by the protocol.
    cursor: u64,
    /// Store slot position passed to `ItemStore::search`.
    position: usize,
    accumulator: SummaryBuilder,
}

impl<C: Catalog> Session<C> {
    /// Fresh session in [`SessionState::Created`].
    pub fn new(id: ConnectionId, catalog: C) -> Self {
        Self {
            id,
            state: SessionState::Created,
            catalog,
            config: SearchConfig::default(),
            store: None,
            cursor: 0,
            position: 0,
            accumulator: SummaryBuilder::new(),
        }
    }

    /// Connection this session belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Items handed out so far. Batch fetches advance it by the requested
    /// count even when the store came up short.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Active search config (the default until iteration starts).
    pub fn config(&self) -> SearchConfig {
        self.config
    }

    /// Number of items folded into the accumulator.
    pub fn revealed(&self) -> u64 {
        self.accumulator.folded()
    }

    /// Log in. The key is checked before the state, so a wrong key is
    /// reported as such from any state.
    pub fn login(&mut self, username: &str, key: i32) -> Result<(), SessionError> {
        let expected = expected_key(username);
        if key != expected {
            tracing::info!(conn_id = self.id, username, "login rejected: key mismatch");
            return Err(SessionError::InvalidKey { submitted: key, expected });
        }

        self.require(Operation::Login, &[SessionState::Created])?;
        self.transition(SessionState::Opened);
        tracing::info!(conn_id = self.id, username, "logged in");
        Ok(())
    }

    /// Bind an explicit search config. Only valid straight after login.
    pub fn configure(&mut self, config: SearchConfig) -> Result<(), SessionError> {
        self.require(Operation::Configure, &[SessionState::Opened])?;
        self.begin_iteration(config);
        Ok(())
    }

    /// Reveal the next kind A item.
    ///
    /// Searches the configured kinds narrowed to A. Slots of other kinds are
    /// skipped and stay unrevealed; a config without A depletes on the first
    /// single fetch.
    pub fn fetch_one(&mut self) -> Result<Fetch<ItemA>, SessionError> {
        if !self.ready_to_iterate(Operation::FetchOne)? {
            return Ok(Fetch::Depleted);
        }

        let found = self.search(self.config.allowed & ItemKinds::A, 1).into_iter().find_map(|item| {
            match item {
                Item::A(item) => Some(item),
                Item::B(_) | Item::C(_) => None,
            }
        });
        let Some(item) = found else {
            self.transition(SessionState::Depleted);
            return Ok(Fetch::Depleted);
        };

        self.cursor += 1;
        self.accumulator.add(&Item::A(item.clone()));
        Ok(Fetch::Found(item))
    }

    /// Reveal up to `count` items.
    ///
    /// A short batch is returned and depletes the session; the cursor still
    /// advances by the full `count`. An empty batch depletes the session and
    /// leaves the cursor alone.
    pub fn fetch_batch(&mut self, count: i32) -> Result<Fetch<Vec<Item>>, SessionError> {
        let requested = usize::try_from(count)
            .ok()
            .filter(|requested| *requested > 0)
            .ok_or(SessionError::InvalidBatchSize(count))?;

        if !self.ready_to_iterate(Operation::FetchBatch)? {
            return Ok(Fetch::Depleted);
        }

        let found = self.search(self.config.allowed, requested);
        if found.is_empty() {
            self.transition(SessionState::Depleted);
            return Ok(Fetch::Depleted);
        }

        if found.len() < requested {
            tracing::debug!(conn_id = self.id, requested, found = found.len(), "short batch");
            self.transition(SessionState::Depleted);
        }

        self.cursor = self.cursor.saturating_add(u64::try_from(requested).unwrap_or(u64::MAX));
        self.accumulator.extend(&found);
        Ok(Fetch::Found(found))
    }

    /// Snapshot of the authoritative summary. Only valid once depleted.
    pub fn summary(&self) -> Result<Summary, SessionError> {
        self.require(Operation::Summary, &[SessionState::Depleted])?;
        Ok(self.accumulator.snapshot())
    }

    /// Log out.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.require(
            Operation::Logout,
            &[SessionState::Opened, SessionState::Iterated, SessionState::Depleted],
        )?;
        self.transition(SessionState::Closed);
        tracing::info!(conn_id = self.id, revealed = self.revealed(), "logged out");
        Ok(())
    }

    /// Guard for the fetch operations.
    ///
    /// `Opened` gets the default config applied first; `Depleted` reports
    /// `false` so fetches keep answering "ended" without faulting.
    fn ready_to_iterate(&mut self, operation: Operation) -> Result<bool, SessionError> {
        match self.state {
            SessionState::Opened => {
                tracing::debug!(conn_id = self.id, %operation, "applying default search config");
                self.begin_iteration(SearchConfig::default());
                Ok(true)
            },
            SessionState::Iterated => Ok(true),
            SessionState::Depleted => Ok(false),
            SessionState::Created | SessionState::Closed => Err(self.violation(operation)),
        }
    }

    fn begin_iteration(&mut self, config: SearchConfig) {
        self.store = Some(self.catalog.open(config.limit));
        self.config = config;
        self.cursor = 0;
        self.position = 0;
        self.accumulator = SummaryBuilder::new();
        self.transition(SessionState::Iterated);
    }

    fn search(&mut self, allowed: ItemKinds, count: usize) -> Vec<Item> {
        if allowed.is_empty() {
            return Vec::new();
        }
        match &self.store {
            Some(store) => store.search(allowed, &mut self.position, count),
            None => Vec::new(),
        }
    }

    fn require(&self, operation: Operation, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) { Ok(()) } else { Err(self.violation(operation)) }
    }

    fn violation(&self, operation: Operation) -> SessionError {
        tracing::warn!(conn_id = self.id, %operation, state = %self.state, "protocol violation");
        SessionError::InvalidTransition { operation, state: self.state }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(conn_id = self.id, from = %self.state, to = %next, "session transition");
        self.state = next;
    }
}

impl<C: Catalog> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("cursor", &self.cursor)
            .field("revealed", &self.accumulator.folded())
            .finish_non_exhaustive()
    }
}
