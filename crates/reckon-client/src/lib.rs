//! Reckon reference client.
//!
//! Connects to a server, logs in, iterates the session's items, folds them
//! into a summary the same way the server does, and submits it for
//! verification.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;

use std::time::Duration;

pub use client::{Client, SessionReport};
pub use error::ClientError;
use reckon_core::{Credentials, Environment};
use reckon_proto::{ItemKinds, TransportError};
use tokio::net::TcpStream;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (e.g., "127.0.0.1:7878")
    pub server: String,
    /// Account name
    pub username: String,
    /// Login key; derived from the username when absent
    pub key: Option<i32>,
    /// Store limit sent with `init`
    pub search_limit: i32,
    /// Items per `fetchBatch`
    pub batch_size: i32,
    /// Kinds to iterate
    pub allowed_types: ItemKinds,
    /// Sleep after a pending fetch
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:7878".to_string(),
            username: "reckoner".to_string(),
            key: None,
            search_limit: 100,
            batch_size: 10,
            allowed_types: ItemKinds::A,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl ClientConfig {
    /// Credentials to log in with.
    pub fn credentials(&self) -> Credentials {
        match self.key {
            Some(key) => Credentials::new(self.username.clone(), key),
            None => Credentials::derive(self.username.clone()),
        }
    }
}

/// Open a TCP connection to `config.server`.
pub async fn connect<E: Environment>(
    config: &ClientConfig,
    env: E,
) -> Result<Client<TcpStream, E>, ClientError> {
    let stream = TcpStream::connect(&config.server).await.map_err(TransportError::from)?;
    stream.set_nodelay(true).map_err(TransportError::from)?;
    tracing::debug!(server = %config.server, "connected");
    Ok(Client::new(stream, env).with_retry_delay(config.retry_delay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_derived() {
        let config = ClientConfig { username: "alice".to_string(), ..ClientConfig::default() };
        assert!(config.credentials().is_valid());
    }

    #[test]
    fn explicit_key_is_kept() {
        let config = ClientConfig { key: Some(-1), ..ClientConfig::default() };
        let credentials = config.credentials();
        assert_eq!(credentials.key, -1);
        assert!(!credentials.is_valid());
    }
}
