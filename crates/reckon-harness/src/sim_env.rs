//! Seeded environment for simulations.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reckon_core::Environment;

/// Deterministic environment: seeded RNG plus Tokio time.
///
/// Inside a turmoil simulation Tokio time is virtual, so sleeps cost no
/// wall-clock time. Clones share one RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    seed: u64,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment seeded with `seed`. The seed is logged so a failing run
    /// can be replayed.
    pub fn with_seed(seed: u64) -> Self {
        tracing::debug!(seed, "sim env seeded");
        Self { seed, rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("seed", &self.seed).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> std::time::Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
