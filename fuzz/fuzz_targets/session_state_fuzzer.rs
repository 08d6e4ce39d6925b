//! Fuzz target for the session state machine
//!
//! Drives a real connection and the reference model with the same call
//! sequence and checks they never disagree.
//!
//! # Invariants
//!
//! - `OPENED` ONLY reachable via `logIn` with the correct key from `CREATED`
//! - No transition FROM `CLOSED` (terminal)
//! - `DEPLETED` only leaves to `CLOSED`
//! - Summaries are only accepted when honest and only after depletion
//! - Items revealed never exceed the catalog size
//! - NEVER panic on out-of-order calls

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use reckon_core::{SessionState, generate_slots};
use reckon_harness::{ModelSession, Operation, Outcome, SessionDriver, SimEnv};

/// Fuzz input: catalog shape plus call sequence.
#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    /// Seed for catalog generation.
    catalog_seed: u64,
    /// Catalog size (kept small so sequences reach depletion).
    catalog_size: u8,
    /// Calls to apply.
    ops: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let size = usize::from(input.catalog_size % 32);
    let items = generate_slots(input.catalog_seed, size).slots().to_vec();

    let mut model = ModelSession::new(items.clone());
    let mut real = SessionDriver::new(items, SimEnv::with_seed(input.catalog_seed));

    for op in &input.ops {
        let previous = real.state();

        let expected = model.apply(op);
        let actual = real.apply(op);
        assert_eq!(expected, actual, "divergence on {op:?} from {previous}");
        assert_eq!(model.state(), real.state());

        let state = real.state();
        if previous == SessionState::Closed {
            assert_eq!(state, SessionState::Closed);
        }
        if previous == SessionState::Depleted {
            assert!(matches!(state, SessionState::Depleted | SessionState::Closed));
        }
        if state == SessionState::Opened && previous != SessionState::Opened {
            assert_eq!(previous, SessionState::Created);
            assert!(matches!(op, Operation::LogIn { correct_key: true }));
        }
        if matches!(actual, Outcome::Flag(true)) {
            if let Operation::SaveSummary { tamper } = op {
                assert!(!tamper);
                assert_eq!(previous, SessionState::Depleted);
            }
        }
        assert!(real.received() <= size as u64);
    }
});
