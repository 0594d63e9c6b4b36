//! Stockwatch - simulated stock price push server
//!
//! Main entry point for the WebSocket server

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stockwatch_server::{load_config, AppService, WsServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Stockwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let server_config = config.server.clone();

    let service = Arc::new(AppService::new(config).await);
    service.start()?;
    info!("Background services started");

    let server = WsServer::bind(&server_config, Arc::clone(&service)).await?;

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        let _ = shutdown_tx.send(());
    });

    info!("WebSocket server listening on ws://{}", server.local_addr()?);
    info!("Press Ctrl+C to shutdown");

    let result = server.run_with_shutdown(shutdown_rx).await;
    service.stop().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("Server shutdown complete");
    Ok(())
}
