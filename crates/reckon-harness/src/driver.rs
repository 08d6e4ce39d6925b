//! Drives a real in-process connection with model operations.

use reckon_core::{Connection, ServiceConfig, SessionFactory, SessionState, StaticCatalog, expected_key};
use reckon_proto::{
    BatchFetchResult, Call, Envelope, Fault, FetchResult, FetchStatus, Item, Reply, SummaryBuilder,
};

use crate::{
    model::{Operation, Outcome},
    sim_env::SimEnv,
};

/// Username every driven session logs in with.
pub const DRIVER_USERNAME: &str = "harness";

/// Summary text no generated item can produce.
const FORGED_TEXT: &str = "x=forged";

/// Real connection plus the client-side bookkeeping needed to build
/// summaries.
pub struct SessionDriver {
    connection: Connection<StaticCatalog, SimEnv>,
    received: SummaryBuilder,
}

impl SessionDriver {
    /// Fresh connection over `catalog` with the pending draw disabled.
    pub fn new(catalog: Vec<Item>, env: SimEnv) -> Self {
        let factory =
            SessionFactory::new(StaticCatalog::new(catalog), env, ServiceConfig { pending_one_in: 0 });
        Self { connection: factory.create(), received: SummaryBuilder::new() }
    }

    /// Current state of the real session.
    pub fn state(&self) -> SessionState {
        self.connection.state()
    }

    /// Items received so far.
    pub fn received(&self) -> u64 {
        self.received.folded()
    }

    /// Apply `op` through the service router.
    pub fn apply(&mut self, op: &Operation) -> Outcome {
        let call = match op {
            Operation::LogIn { correct_key } => {
                let key = expected_key(DRIVER_USERNAME);
                let key = if *correct_key { key } else { key.wrapping_add(1) };
                Call::LogIn { username: DRIVER_USERNAME.to_string(), key }
            },
            Operation::Init { kinds, limit } => Call::Init {
                allowed_types: Operation::kind_set(*kinds).names(),
                limit: i32::from(*limit),
            },
            Operation::Fetch => Call::Fetch,
            Operation::FetchBatch { count } => Call::FetchBatch { count: i32::from(*count) },
            Operation::SaveSummary { tamper } => {
                let mut summary = self.received.snapshot();
                if *tamper {
                    summary.insert("ItemA", FORGED_TEXT);
                }
                Call::SaveSummary { summary }
            },
            Operation::LogOut => Call::LogOut,
        };

        let reply = self.connection.dispatch(Envelope::routed(call));
        self.observe(reply)
    }

    fn observe(&mut self, reply: Reply) -> Outcome {
        match reply {
            Reply::Done => Outcome::Done,
            Reply::Flag(flag) => Outcome::Flag(flag),
            Reply::Fetched(FetchResult { status, item }) => match (status, item) {
                (FetchStatus::Item, Some(item)) => {
                    self.received.add(&Item::A(item.clone()));
                    Outcome::Item(item)
                },
                (FetchStatus::Ended, _) => Outcome::Ended,
                _ => Outcome::Violation,
            },
            Reply::FetchedBatch(BatchFetchResult { status, items }) => match (status, items) {
                (FetchStatus::Item, Some(items)) => {
                    self.received.extend(&items);
                    Outcome::Items(items)
                },
                (FetchStatus::Ended, _) => Outcome::Ended,
                _ => Outcome::Violation,
            },
            Reply::Fault(Fault::InvalidKey { .. }) => Outcome::InvalidKey,
            Reply::Fault(_) => Outcome::Violation,
        }
    }
}
