use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use node_director::config::loader::{config_from_env, load_config};
use node_director::config::watcher::ConfigWatcher;
use node_director::lifecycle::signals::forward_signals;
use node_director::observability::{logging, metrics};
use node_director::{HttpServer, InMemoryRegistry, NodeRegistry, Shutdown};

#[derive(Parser)]
#[command(name = "node-director")]
#[command(about = "Routes clients to a healthy, least-recently-used backend node", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults plus environment overrides when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "node-director starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        health_mode = ?config.health_check.mode,
        throttle_max = config.throttle.max_requests,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry: Arc<dyn NodeRegistry> = match &config.registry.persistence_path {
        Some(path) => Arc::new(InMemoryRegistry::open(path)?),
        None => {
            tracing::warn!("No registry persistence path configured, nodes live in memory only");
            Arc::new(InMemoryRegistry::new())
        }
    };

    // Keep the watcher alive for the life of the process.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(guard) => (Some(guard), updates),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start config watcher, hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let signals = shutdown.clone();
    tokio::spawn(async move { forward_signals(&signals).await });

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, registry);

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            server
                .run_tls(addr, &tls, config_updates, server_shutdown)
                .await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, config_updates, server_shutdown).await?;
        }
    }

    if !shutdown.is_triggered() {
        tracing::warn!("Server stopped without a shutdown signal");
        shutdown.trigger("server exited");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
