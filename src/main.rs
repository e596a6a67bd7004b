//! screen-relay: relays live screen frames from one producer to many viewers.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use screen_relay::{NoopHandler, RegistryConfig, RelayServer, ServerConfig};

#[derive(Parser)]
#[command(name = "screen-relay", about = "WebSocket relay for live screen frames")]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Frames buffered per viewer before new frames are dropped for it.
    #[arg(long, default_value_t = 8)]
    viewer_queue: usize,

    /// Maximum concurrent connections (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Seconds between relay stats log lines (0 disables).
    #[arg(long, default_value_t = 30)]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_relay=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = ServerConfig::with_addr(args.bind)
        .max_connections(args.max_connections)
        .stats_interval(Duration::from_secs(args.stats_interval));
    let registry_config = RegistryConfig::default().viewer_queue_frames(args.viewer_queue);
    let server = RelayServer::with_registry_config(config, NoopHandler, registry_config);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    match server.run_until(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Relay server failed");
            ExitCode::FAILURE
        }
    }
}
