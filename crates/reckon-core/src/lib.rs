//! Reckon session protocol.
//!
//! Per-connection state machine behind the `Login`, `Search` and `Reports`
//! services: login gating, item iteration (single and batched), depletion,
//! and summary reconciliation.
//!
//! ## Architecture
//!
//! ```text
//! SessionFactory ── create() ──> Connection
//!                                  ├─ Session          (state machine, owned)
//!                                  ├─ LoginHandler     (weak ref)
//!                                  ├─ SearchHandler    (weak ref + Environment)
//!                                  └─ ReportsHandler   (weak ref)
//! ```
//!
//! The crate performs no I/O; the optional `system` feature adds the
//! production [`Environment`]. Transports feed [`Connection::dispatch`] and
//! write back the returned [`reckon_proto::Reply`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod env;
mod error;
mod factory;
mod handler;
pub mod session;
pub mod store;
#[cfg(feature = "system")]
mod system_env;

pub use credentials::{Credentials, KEY_MODULUS, expected_key};
pub use env::Environment;
pub use error::SessionError;
pub use factory::{Connection, ServiceConfig, SessionFactory};
pub use handler::{LoginHandler, ReportsHandler, SearchHandler, Service, SessionRef};
pub use session::{
    ConnectionId, Fetch, MAX_SEARCH_LIMIT, Operation, SearchConfig, Session, SessionState,
};
pub use store::{Catalog, ItemStore, RandomCatalog, SlotStore, StaticCatalog, generate_slots};
#[cfg(feature = "system")]
pub use system_env::SystemEnv;
