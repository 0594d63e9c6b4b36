//! WebSocket listener and accept loop

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use stockwatch_core::{AppConfig, ServerConfig};

use crate::service::AppService;
use crate::session::handle_connection;

/// Bound WebSocket server
pub struct WsServer {
    listener: TcpListener,
    service: Arc<AppService>,
}

impl WsServer {
    /// Bind `host:port`; port 0 picks an ephemeral port
    pub async fn bind(config: &ServerConfig, service: Arc<AppService>) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("WebSocket server bound to {}", listener.local_addr()?);
        Ok(Self { listener, service })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn service(&self) -> &Arc<AppService> {
        &self.service
    }

    /// Accept connections until `shutdown` fires
    pub async fn run_with_shutdown(self, mut shutdown: oneshot::Receiver<()>) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let service = Arc::clone(&self.service);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer, service).await {
                                    debug!("Connection from {} ended: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept failed: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Builder for server configuration
pub struct WsServerBuilder {
    config: AppConfig,
    service: Option<Arc<AppService>>,
}

impl WsServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            service: None,
        }
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Use an already wired service instead of building one from the config
    pub fn service(mut self, service: Arc<AppService>) -> Self {
        self.service = Some(service);
        self
    }

    pub async fn build(self) -> anyhow::Result<WsServer> {
        let service = match self.service {
            Some(service) => service,
            None => Arc::new(AppService::new(self.config.clone()).await),
        };
        WsServer::bind(&self.config.server, service).await
    }
}

impl Default for WsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_binds_ephemeral_port() {
        let server = WsServerBuilder::new()
            .host("127.0.0.1")
            .port(0)
            .build()
            .await
            .unwrap();

        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert_eq!(server.service().store().backend(), "memory");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let server = WsServerBuilder::new().port(0).build().await.unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.run_with_shutdown(rx));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
