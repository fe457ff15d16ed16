//! HTTP API server for link extraction.

mod handlers;
mod routes;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use linkharvest_core::LinkExtractor;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::handlers::AppState;
use crate::routes::create_router;

/// Serve the link extraction API
#[derive(Parser, Debug)]
#[command(name = "linkharvest-server")]
#[command(version)]
#[command(about = "HTTP API for link extraction", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "LINKHARVEST_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "LINKHARVEST_PORT", default_value_t = 5001)]
    port: u16,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("HTTP server shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("Invalid HTTP listen address")?;

    let extractor = LinkExtractor::new().context("Failed to initialize HTTP client")?;
    let app = create_router(AppState { extractor: Arc::new(extractor) });

    let listener = TcpListener::bind(&addr).await.context("Failed to bind HTTP server")?;
    info!("HTTP API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}
