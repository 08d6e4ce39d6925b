//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` drives the pending draw and catalog seeds in the running
//! server, and the retry sleeps of the command-line client. Enabled by the
//! `system` feature.

use std::time::Duration;

use crate::env::Environment;

/// Production environment using system time and OS randomness.
///
/// - Time: `std::time::Instant::now()`
/// - Sleep: `tokio::time::sleep()`
/// - Randomness: `getrandom`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Zeros still give a usable catalog seed and pending draw.
            tracing::error!(error = %e, "getrandom failed, falling back to zeros");
            buffer.fill(0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1);
    }

    #[test]
    fn random_draws_differ() {
        let env = SystemEnv::new();

        let draws: Vec<u64> = (0..4).map(|_| env.random_u64()).collect();
        assert!(draws.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[tokio::test]
    async fn sleep_waits() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;

        assert!(env.now() - start >= Duration::from_millis(20));
    }
}
