//! Service handlers.
//!
//! One handler per named service. Handlers translate calls into session
//! operations and session outcomes into replies or faults. They reference the
//! session weakly: the connection owns it, and a handler outliving its
//! connection reports a protocol violation instead of keeping state alive.

use std::{
    collections::BTreeSet,
    sync::{PoisonError, RwLock, Weak},
};

use reckon_proto::{BatchFetchResult, Call, Fault, FetchResult, Reply, Summary, service};

use crate::{
    env::Environment,
    session::{ConnectionId, Fetch, SearchConfig, Session},
    store::Catalog,
};

/// A named RPC service bound to one session.
pub trait Service {
    /// Name the router dispatches on.
    const NAME: &'static str;

    /// Execute `call`. Calls this service does not offer yield
    /// [`Fault::UnknownMethod`].
    fn handle(&self, call: Call) -> Reply;

    /// Fault for a call addressed to the wrong service.
    fn unknown_method(call: &Call) -> Reply {
        Reply::Fault(Fault::UnknownMethod {
            service: Self::NAME.to_string(),
            method: call.method_name().to_string(),
        })
    }
}

/// Non-owning handle on a connection's session.
///
/// Mutating operations take the write lock; summary reads share the read
/// lock. A poisoned lock is recovered: every session operation leaves the
/// state consistent before it can panic.
pub struct SessionRef<C: Catalog> {
    inner: Weak<RwLock<Session<C>>>,
}

impl<C: Catalog> SessionRef<C> {
    /// Wrap a weak session reference.
    pub fn new(inner: Weak<RwLock<Session<C>>>) -> Self {
        Self { inner }
    }

    fn write<T>(&self, f: impl FnOnce(&mut Session<C>) -> T) -> Result<T, Fault> {
        let session = self.inner.upgrade().ok_or_else(|| Fault::protocol("session is closed"))?;
        let mut guard = session.write().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut guard))
    }

    fn read<T>(&self, f: impl FnOnce(&Session<C>) -> T) -> Result<T, Fault> {
        let session = self.inner.upgrade().ok_or_else(|| Fault::protocol("session is closed"))?;
        let guard = session.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&guard))
    }
}

impl<C: Catalog> Clone for SessionRef<C> {
    fn clone(&self) -> Self {
        Self { inner: Weak::clone(&self.inner) }
    }
}

/// `Login` service.
pub struct LoginHandler<C: Catalog> {
    conn_id: ConnectionId,
    session: SessionRef<C>,
}

impl<C: Catalog> LoginHandler<C> {
    /// Handler bound to `session`.
    pub fn new(conn_id: ConnectionId, session: SessionRef<C>) -> Self {
        Self { conn_id, session }
    }

    /// `logIn(username, key)`.
    ///
    /// Wrong key: [`Fault::InvalidKey`] with both keys. Wrong state:
    /// [`Fault::ProtocolViolation`].
    pub fn log_in(&self, username: &str, key: i32) -> Result<(), Fault> {
        tracing::debug!(conn_id = self.conn_id, username, "logIn");
        self.session.write(|session| session.login(username, key))?.map_err(Fault::from)
    }

    /// `logOut()`.
    pub fn log_out(&self) -> Result<(), Fault> {
        tracing::debug!(conn_id = self.conn_id, "logOut");
        self.session.write(|session| session.logout())?.map_err(Fault::from)
    }
}

impl<C: Catalog> Service for LoginHandler<C> {
    const NAME: &'static str = service::LOGIN;

    fn handle(&self, call: Call) -> Reply {
        match call {
            Call::LogIn { username, key } => self.log_in(&username, key).into(),
            Call::LogOut => self.log_out().into(),
            other => Self::unknown_method(&other),
        }
    }
}

/// `Search` service.
///
/// Every fetch first rolls a one-in-`pending_one_in` draw; a hit answers
/// [`reckon_proto::FetchStatus::Pending`] without touching the session.
pub struct SearchHandler<C: Catalog, E: Environment> {
    conn_id: ConnectionId,
    session: SessionRef<C>,
    env: E,
    pending_one_in: u32,
}

impl<C: Catalog, E: Environment> SearchHandler<C, E> {
    /// Handler bound to `session`. `pending_one_in == 0` disables the draw.
    pub fn new(conn_id: ConnectionId, session: SessionRef<C>, env: E, pending_one_in: u32) -> Self {
        Self { conn_id, session, env, pending_one_in }
    }

    fn roll_pending(&self) -> bool {
        self.pending_one_in != 0 && self.env.random_u64() % u64::from(self.pending_one_in) == 0
    }

    /// `fetch()`.
    pub fn fetch(&self) -> Result<FetchResult, Fault> {
        if self.roll_pending() {
            tracing::debug!(conn_id = self.conn_id, "fetch: pending");
            return Ok(FetchResult::pending());
        }

        match self.session.write(|session| session.fetch_one())?? {
            Fetch::Found(item) => Ok(FetchResult::item(item)),
            Fetch::Depleted => {
                tracing::debug!(conn_id = self.conn_id, "fetch: ended");
                Ok(FetchResult::ended())
            },
        }
    }

    /// `fetchBatch(count)`.
    pub fn fetch_batch(&self, count: i32) -> Result<BatchFetchResult, Fault> {
        if self.roll_pending() {
            tracing::debug!(conn_id = self.conn_id, count, "fetchBatch: pending");
            return Ok(BatchFetchResult::pending());
        }

        match self.session.write(|session| session.fetch_batch(count))?? {
            Fetch::Found(items) => {
                tracing::debug!(conn_id = self.conn_id, count, found = items.len(), "fetchBatch");
                Ok(BatchFetchResult::items(items))
            },
            Fetch::Depleted => {
                tracing::debug!(conn_id = self.conn_id, count, "fetchBatch: ended");
                Ok(BatchFetchResult::ended())
            },
        }
    }

    /// `init(allowedTypes, limit)`.
    ///
    /// Non-fatal: any failure, including a wrong state, answers `false`.
    pub fn init(&self, allowed_types: &BTreeSet<String>, limit: i32) -> bool {
        let outcome = SearchConfig::from_wire(allowed_types, limit).map_err(Fault::from).and_then(
            |config| self.session.write(|session| session.configure(config))?.map_err(Fault::from),
        );

        match outcome {
            Ok(()) => {
                tracing::debug!(conn_id = self.conn_id, ?allowed_types, limit, "init accepted");
                true
            },
            Err(fault) => {
                tracing::debug!(conn_id = self.conn_id, %fault, "init declined");
                false
            },
        }
    }
}

impl<C: Catalog, E: Environment> Service for SearchHandler<C, E> {
    const NAME: &'static str = service::SEARCH;

    fn handle(&self, call: Call) -> Reply {
        match call {
            Call::Fetch => self.fetch().into(),
            Call::FetchBatch { count } => self.fetch_batch(count).into(),
            Call::Init { allowed_types, limit } => self.init(&allowed_types, limit).into(),
            other => Self::unknown_method(&other),
        }
    }
}

/// `Reports` service.
pub struct ReportsHandler<C: Catalog> {
    conn_id: ConnectionId,
    session: SessionRef<C>,
}

impl<C: Catalog> ReportsHandler<C> {
    /// Handler bound to `session`.
    pub fn new(conn_id: ConnectionId, session: SessionRef<C>) -> Self {
        Self { conn_id, session }
    }

    /// `saveSummary(summary)`.
    ///
    /// Faults unless the session is depleted. A mismatch is `Ok(false)`.
    pub fn save_summary(&self, submitted: &Summary) -> Result<bool, Fault> {
        let expected = self.session.read(|session| session.summary())??;

        if *submitted == expected {
            tracing::info!(conn_id = self.conn_id, kinds = expected.len(), "summary verified");
            return Ok(true);
        }

        tracing::info!(
            conn_id = self.conn_id,
            submitted_kinds = submitted.len(),
            submitted_texts = submitted.text_count(),
            expected_kinds = expected.len(),
            expected_texts = expected.text_count(),
            "summary mismatch"
        );
        Ok(false)
    }
}

impl<C: Catalog> Service for ReportsHandler<C> {
    const NAME: &'static str = service::REPORTS;

    fn handle(&self, call: Call) -> Reply {
        match call {
            Call::SaveSummary { summary } => self.save_summary(&summary).into(),
            other => Self::unknown_method(&other),
        }
    }
}
