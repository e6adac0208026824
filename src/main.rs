//! socket-responder: HTTP request/response over raw TCP sockets
//!
//! Each connection is read once, its request line parsed, and exactly one
//! response written before the socket is closed. Handlers:
//! - Echo: replies with the request line
//! - Dice: rolls `rolls` dice with `sides` sides, as text or HTML
//!
//! Features:
//! - Sequential or bounded-concurrent connection handling
//! - Graceful shutdown on Ctrl-C
//! - Configuration via CLI arguments or TOML file

mod config;
mod handlers;
mod protocols;
mod server;

use config::Config;
use server::Server;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        handler = ?config.handler,
        mode = ?config.mode,
        max_connections = config.max_connections,
        read_buffer_size = config.read_buffer_size,
        "Starting socket-responder"
    );

    let server = Arc::new(Server::bind(&config).await?);

    let signalled = Arc::clone(&server);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                signalled.shutdown();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    server.serve().await?;
    Ok(())
}
