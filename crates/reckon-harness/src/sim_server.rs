//! Reckon server running inside a turmoil simulation.
//!
//! Same frame loop as the production server ([`reckon_server::serve_connection`])
//! but accepting on a simulated listener.

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

use reckon_core::{Catalog, ServiceConfig, SessionFactory};
use turmoil::net::TcpListener;

use crate::sim_env::SimEnv;

/// Port simulated servers listen on.
pub const SIM_PORT: u16 = 7878;

/// Accept connections forever, serving each on its own task.
pub async fn run_sim_server<C: Catalog>(
    catalog: C,
    env: SimEnv,
    config: ServiceConfig,
) -> turmoil::Result {
    let factory = Arc::new(SessionFactory::new(catalog, env, config));
    let listener = TcpListener::bind((IpAddr::from(Ipv4Addr::UNSPECIFIED), SIM_PORT)).await?;

    loop {
        let (stream, peer) = listener.accept().await?;
        let factory = Arc::clone(&factory);

        tokio::spawn(async move {
            let connection = factory.create();
            tracing::debug!(conn_id = connection.id(), %peer, "sim connection accepted");
            if let Err(e) = reckon_server::serve_connection(stream, &connection).await {
                tracing::debug!(conn_id = connection.id(), error = %e, "sim connection error");
            }
        });
    }
}
