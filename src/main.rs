//! Card Gateway
//!
//! Thin server-side proxy between the card web front end and the backend API.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                CARD GATEWAY                   │
//!   Browser request      │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ─────────────────────┼─▶│  http   │──▶│ handlers │──▶│ upstream  │──┼──▶ Backend API
//!                        │  │ server  │   │ (contract│   │  client   │  │    (/api/...)
//!                        │  └─────────┘   │  per     │   └─────┬─────┘  │
//!                        │                │ endpoint)│         │        │
//!   Browser response     │  ┌─────────┐   └──────────┘         │        │
//!   ◀────────────────────┼──│response │◀───────────────────────┘        │
//!                        │  │ relay   │                                 │
//!                        │  └─────────┘                                 │
//!                        │  config · observability · lifecycle          │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use card_gateway::config::load_config;
use card_gateway::lifecycle::{wait_for_signal, Shutdown};
use card_gateway::observability::{logging, metrics};
use card_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "card-gateway")]
#[command(about = "Browser-facing proxy for the card backend API", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long, env = "GATEWAY_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("card-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        docker = config.backend.docker,
        backend_timeout_secs = config.timeouts.backend_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
