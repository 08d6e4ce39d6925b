//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from system resources
//! (time, randomness). The pending draw of the search service and the catalog
//! generator both consume randomness only through this trait, so a seeded
//! implementation makes a whole session reproducible.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleep.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code (client retry loops) sleeps; session logic never
    /// does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Simulation implementations must be seeded and log their seed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
