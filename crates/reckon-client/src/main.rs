//! Reckon client binary.
//!
//! # Usage
//!
//! ```bash
//! # Default configuration, single fetches
//! reckon-client --server 127.0.0.1:7878 --username alice
//!
//! # Explicit kinds, batched
//! reckon-client --types ItemA,ItemC --limit 50 --batch-size 8
//! ```

use std::time::Duration;

use clap::Parser;
use reckon_client::{ClientConfig, connect};
use reckon_core::SystemEnv;
use reckon_proto::ItemKinds;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Reckon session protocol client
#[derive(Parser, Debug)]
#[command(name = "reckon-client")]
#[command(about = "Reckon session protocol client")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    server: String,

    /// Account name
    #[arg(short, long, default_value = "reckoner")]
    username: String,

    /// Login key (derived from the username if omitted)
    #[arg(short, long, allow_hyphen_values = true)]
    key: Option<i32>,

    /// Item kinds to iterate
    #[arg(long, value_delimiter = ',', default_value = "ItemA")]
    types: Vec<String>,

    /// Store limit sent with init
    #[arg(long, default_value = "100")]
    limit: i32,

    /// Items per batch fetch
    #[arg(long, default_value = "10")]
    batch_size: i32,

    /// Milliseconds to wait after a pending fetch
    #[arg(long, default_value = "100")]
    retry_delay_ms: u64,

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

    let config = ClientConfig {
        server: args.server,
        username: args.username,
        key: args.key,
        search_limit: args.limit,
        batch_size: args.batch_size,
        allowed_types: ItemKinds::from_names(&args.types)?,
        retry_delay: Duration::from_millis(args.retry_delay_ms),
    };

    let mut client = connect(&config, SystemEnv::new()).await?;
    let report = client.run(&config).await?;

    tracing::info!(
        revealed = report.revealed,
        kinds = report.summary.len(),
        texts = report.summary.text_count(),
        "summary accepted"
    );

    Ok(())
}
