//! Reckon server binary.
//!
//! # Usage
//!
//! ```bash
//! reckon-server --bind 0.0.0.0:7878
//!
//! # Never answer "pending"
//! reckon-server --bind 127.0.0.1:7878 --pending-one-in 0
//! ```

use clap::Parser;
use reckon_core::ServiceConfig;
use reckon_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Reckon session protocol server
#[derive(Parser, Debug)]
#[command(name = "reckon-server")]
#[command(about = "Reckon session protocol server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:7878")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Answer one fetch in N with "pending" (0 disables)
    #[arg(long, default_value = "10")]
    pending_one_in: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(bind = %args.bind, pending_one_in = args.pending_one_in, "Reckon server starting");

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        max_connections: args.max_connections,
        service: ServiceConfig { pending_one_in: args.pending_one_in },
    };

    let server = Server::bind(config).await?;

    tracing::info!(addr = %server.local_addr()?, "server listening");

    server.run().await?;

    Ok(())
}
