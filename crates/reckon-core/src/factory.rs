//! Session factory and per-connection service router.
//!
//! ## Responsibilities
//!
//! - Connection ids: process-wide, monotonically increasing, advisory only
//! - Binding: one session and one handler per service for each connection
//! - Routing: dispatch envelopes by service name
//!
//! ## Design
//!
//! The [`Connection`] owns the session (`Arc`); handlers only hold `Weak`
//! references to it. Dropping the connection drops the session.

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicU64, Ordering},
};

use reckon_proto::{Envelope, Fault, Reply, service};

use crate::{
    env::Environment,
    handler::{LoginHandler, ReportsHandler, SearchHandler, Service, SessionRef},
    session::{ConnectionId, Session, SessionState},
    store::Catalog,
};

/// Service behaviour knobs shared by every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Odds of a fetch answering pending: one in `pending_one_in`.
    /// Zero disables pending answers.
    pub pending_one_in: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { pending_one_in: 10 }
    }
}

/// Creates one [`Connection`] per accepted transport connection.
pub struct SessionFactory<C: Catalog, E: Environment> {
    catalog: C,
    env: E,
    config: ServiceConfig,
    next_id: AtomicU64,
}

impl<C: Catalog, E: Environment> SessionFactory<C, E> {
    /// Factory opening stores from `catalog`.
    pub fn new(catalog: C, env: E, config: ServiceConfig) -> Self {
        Self { catalog, env, config, next_id: AtomicU64::new(0) }
    }

    /// Allocate a fresh session and bind the three services to it.
    pub fn create(&self) -> Connection<C, E> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Arc::new(RwLock::new(Session::new(id, self.catalog.clone())));
        let session_ref = SessionRef::new(Arc::downgrade(&session));

        tracing::info!(conn_id = id, "session created");

        Connection {
            id,
            login: LoginHandler::new(id, session_ref.clone()),
            search: SearchHandler::new(
                id,
                session_ref.clone(),
                self.env.clone(),
                self.config.pending_one_in,
            ),
            reports: ReportsHandler::new(id, session_ref),
            session,
        }
    }

    /// Number of connections created so far.
    pub fn connections_created(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Service config handed to every connection.
    pub fn config(&self) -> ServiceConfig {
        self.config
    }
}

impl<C: Catalog, E: Environment> std::fmt::Debug for SessionFactory<C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("config", &self.config)
            .field("connections_created", &self.connections_created())
            .finish_non_exhaustive()
    }
}

/// One connection's session plus its bound services.
pub struct Connection<C: Catalog, E: Environment> {
    id: ConnectionId,
    session: Arc<RwLock<Session<C>>>,
    login: LoginHandler<C>,
    search: SearchHandler<C, E>,
    reports: ReportsHandler<C>,
}

impl<C: Catalog, E: Environment> Connection<C, E> {
    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.read().unwrap_or_else(std::sync::PoisonError::into_inner).state()
    }

    /// Weak handle on this connection's session.
    pub fn session_ref(&self) -> SessionRef<C> {
        SessionRef::new(Arc::downgrade(&self.session))
    }

    /// Route `envelope` to the service it names.
    pub fn dispatch(&self, envelope: Envelope) -> Reply {
        let Envelope { service: name, call } = envelope;
        tracing::trace!(conn_id = self.id, service = %name, method = call.method_name(), "dispatch");

        match name.as_str() {
            service::LOGIN => self.login.handle(call),
            service::SEARCH => self.search.handle(call),
            service::REPORTS => self.reports.handle(call),
            _ => {
                tracing::warn!(conn_id = self.id, service = %name, "unknown service");
                Reply::Fault(Fault::UnknownService { name })
            },
        }
    }
}

impl<C: Catalog, E: Environment> Drop for Connection<C, E> {
    fn drop(&mut self) {
        tracing::info!(conn_id = self.id, state = %self.state(), "session discarded");
    }
}
