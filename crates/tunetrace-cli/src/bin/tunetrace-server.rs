//! tunetrace-server - Upload API and streaming match socket
//!
//! Usage: tunetrace-server [--config tunetrace.toml] [--host H] [--port P]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tunetrace_cli::server::{create_router, drain_worker, Services};
use tunetrace_core::ServiceConfig;

/// How long queued ingestion may keep running once the listener has stopped
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "tunetrace-server")]
#[command(about = "Serve track uploads and streaming identification", long_about = None)]
struct Args {
    /// Configuration file (TOML); built-in defaults are used when it does not exist
    #[arg(short, long, default_value = "tunetrace.toml")]
    config: String,

    /// Override the listen address
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = Path::new(&args.config);
    let mut config = if config_path.exists() {
        log::info!("Loading configuration from {}", config_path.display());
        ServiceConfig::load(config_path)?
    } else {
        log::info!(
            "No configuration at {}, using defaults",
            config_path.display()
        );
        ServiceConfig::default()
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let services = Services::from_config(&config).await?;
    let worker = tokio::spawn(
        services
            .worker
            .clone()
            .run(services.jobs, config.worker.concurrency),
    );

    let app = create_router(services.state, config.max_upload_bytes());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drain_worker(worker, WORKER_DRAIN_TIMEOUT).await;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until killed
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
