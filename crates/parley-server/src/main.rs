//! Parley server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default port
//! parley-server --bind 0.0.0.0:8900
//!
//! # Verbose logging, tighter connection limit
//! parley-server --bind 127.0.0.1:8900 --max-connections 500 --log-level debug
//! ```

use std::time::Duration;

use clap::Parser;
use parley_server::{DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley real-time messaging server
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Parley real-time conversation and notification server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8900")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Typing-burst expiry in milliseconds
    #[arg(long, default_value = "1000")]
    typing_expiry_ms: u64,

    /// Typing-expiry tick interval in milliseconds
    #[arg(long, default_value = "100")]
    tick_interval_ms: u64,

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

    tracing::info!("Parley server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        driver: DriverConfig {
            max_connections: args.max_connections,
            typing_expiry: Duration::from_millis(args.typing_expiry_ms),
        },
        tick_interval: Duration::from_millis(args.tick_interval_ms),
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
