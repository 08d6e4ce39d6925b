//! Reckon production server.
//!
//! This crate provides the production server implementation using:
//! - Tokio TCP for transport
//! - [`reckon_core`] for the per-connection session protocol
//! - System time and OS randomness
//!
//! ## Architecture
//!
//! ```text
//! reckon-server
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ Server             (accept loop, connection cap)
//!   └─ serve_connection   (frame loop: decode, dispatch, reply)
//!        └─ reckon_core::Connection
//! ```
//!
//! Each accepted stream gets its own session. Requests on one stream are
//! answered strictly in order.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;

use std::{net::SocketAddr, sync::Arc};

pub use error::ServerError;
pub use reckon_core::SystemEnv;
use reckon_core::{Catalog, Connection, Environment, RandomCatalog, ServiceConfig, SessionFactory};
use reckon_proto::{Fault, Frame, Reply, read_frame, write_frame};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::Semaphore,
};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:7878")
    pub bind_address: String,
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Session service behaviour
    pub service: ServiceConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7878".to_string(),
            max_connections: 10_000,
            service: ServiceConfig::default(),
        }
    }
}

/// Production Reckon server.
///
/// Serves sessions over randomly generated catalogs.
pub struct Server {
    listener: TcpListener,
    factory: Arc<SessionFactory<RandomCatalog<SystemEnv>, SystemEnv>>,
    slots: Arc<Semaphore>,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `max_connections` is zero
    /// - Binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".to_string()));
        }

        let env = SystemEnv::new();
        let factory = SessionFactory::new(RandomCatalog::new(env), env, config.service);
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self {
            listener,
            factory: Arc::new(factory),
            slots: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Run the server, accepting connections and serving sessions.
    ///
    /// This method runs until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, "server starting");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                    continue;
                },
            };

            let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                tracing::warn!(%peer, "connection limit reached, refusing");
                drop(stream);
                continue;
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(%peer, error = %e, "set_nodelay failed");
            }

            let factory = Arc::clone(&self.factory);
            tokio::spawn(async move {
                let connection = factory.create();
                tracing::debug!(conn_id = connection.id(), %peer, "connection accepted");

                if let Err(e) = serve_connection(stream, &connection).await {
                    tracing::debug!(conn_id = connection.id(), error = %e, "connection error");
                }
                drop(permit);
            });
        }
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Serve one connection until the peer closes it.
///
/// Each request frame is decoded, dispatched to `connection`, and answered
/// with a response frame carrying the same call id before the next request
/// is read. A request whose payload does not decode is answered with a
/// protocol-violation fault; a broken header ends the connection.
pub async fn serve_connection<S, C, E>(
    mut stream: S,
    connection: &Connection<C, E>,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Catalog,
    E: Environment,
{
    while let Some(frame) = read_frame(&mut stream).await? {
        let call_id = frame.header.call_id();

        let reply = match frame.envelope() {
            Ok(envelope) => connection.dispatch(envelope),
            Err(e) => {
                tracing::warn!(conn_id = connection.id(), call_id, error = %e, "malformed request");
                Reply::Fault(Fault::protocol(format!("malformed request: {e}")))
            },
        };

        write_frame(&mut stream, &Frame::response(call_id, &reply)?).await?;
    }

    tracing::debug!(conn_id = connection.id(), state = %connection.state(), "peer closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use reckon_core::{StaticCatalog, expected_key};
    use reckon_proto::{Call, Envelope, FetchResult, FrameKind, Item, ItemC};

    use super::*;

    fn factory() -> SessionFactory<StaticCatalog, SystemEnv> {
        let items = vec![Item::C(ItemC { field_x: true })];
        SessionFactory::new(StaticCatalog::new(items), SystemEnv::new(), ServiceConfig {
            pending_one_in: 0,
        })
    }

    async fn roundtrip<S>(stream: &mut S, call_id: u32, call: Call) -> Frame
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = Frame::request(call_id, &Envelope::routed(call)).unwrap();
        write_frame(stream, &request).await.unwrap();
        read_frame(stream).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn replies_echo_call_id_in_order() {
        let factory = factory();
        let connection = factory.create();
        let (mut client, server) = tokio::io::duplex(1024);

        let serving = async { serve_connection(server, &connection).await };
        let driving = async {
            let login = Call::LogIn { username: "ada".into(), key: expected_key("ada") };
            let response = roundtrip(&mut client, 41, login).await;
            assert_eq!(response.header.call_id(), 41);
            assert_eq!(response.header.kind(), FrameKind::Response);
            assert_eq!(response.reply().unwrap(), Reply::Done);

            let response = roundtrip(&mut client, 42, Call::Fetch).await;
            assert_eq!(response.header.call_id(), 42);
            assert_eq!(response.reply().unwrap(), Reply::Fetched(FetchResult::ended()));
            drop(client);
        };

        let (served, ()) = tokio::join!(serving, driving);
        served.unwrap();
    }

    #[tokio::test]
    async fn malformed_payload_gets_fault_and_connection_survives() {
        let factory = factory();
        let connection = factory.create();
        let (mut client, server) = tokio::io::duplex(1024);

        let serving = async { serve_connection(server, &connection).await };
        let driving = async {
            // Response-kind frame where a request is expected
            let bogus = Frame::response(5, &Reply::Done).unwrap();
            write_frame(&mut client, &bogus).await.unwrap();
            let response = read_frame(&mut client).await.unwrap().unwrap();
            assert_eq!(response.header.call_id(), 5);
            assert!(matches!(
                response.reply().unwrap(),
                Reply::Fault(Fault::ProtocolViolation { .. })
            ));

            let response = roundtrip(&mut client, 6, Call::LogOut).await;
            assert!(matches!(
                response.reply().unwrap(),
                Reply::Fault(Fault::ProtocolViolation { .. })
            ));
            drop(client);
        };

        let (served, ()) = tokio::join!(serving, driving);
        served.unwrap();
    }

    #[tokio::test]
    async fn broken_header_ends_connection() {
        let factory = factory();
        let connection = factory.create();
        let (mut client, server) = tokio::io::duplex(1024);

        tokio::io::AsyncWriteExt::write_all(&mut client, b"NOPE00000000").await.unwrap();
        let err = serve_connection(server, &connection).await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn zero_connection_cap_is_rejected() {
        let config = ServerRuntimeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 0,
            ..Default::default()
        };
        let Err(err) = Server::bind(config).await else {
            panic!("bind should fail");
        };
        assert!(matches!(err, ServerError::Config(_)));
    }
}
