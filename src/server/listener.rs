//! Relay server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Result;
use crate::relay::{Broadcaster, RelayConfig};
use crate::server::assets::StaticFiles;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::routes::Router;

/// Chat relay server
pub struct RelayServer {
    config: Arc<ServerConfig>,
    broadcaster: Arc<Broadcaster>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_relay_config(config, RelayConfig::default())
    }

    /// Create a new server with custom relay configuration
    pub fn with_relay_config(config: ServerConfig, relay_config: RelayConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            broadcaster: Arc::new(Broadcaster::with_config(relay_config)),
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the broadcaster
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Bind, then serve until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Relay server listening");

        let router = Arc::new(Router::new(
            Arc::clone(&self.broadcaster),
            StaticFiles::new(self.config.public_dir.clone()),
            self.config.advertised_address.clone(),
            local_addr.port(),
        ));

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &router) => result,
        };

        let stats = self.broadcaster.stats();
        tracing::info!(
            published = stats.messages_published,
            deliveries = stats.deliveries,
            missed = stats.missed_deliveries,
            uptime_secs = stats.uptime.as_secs(),
            "Relay stopped"
        );

        result
    }

    async fn accept_loop(&self, listener: &TcpListener, router: &Arc<Router>) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, router);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr, router: &Arc<Router>) {
        // Check connection limit
        let permit: Option<OwnedSemaphorePermit> = match self.connection_semaphore {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(
            connection = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = Arc::clone(&self.config);
        let router = Arc::clone(router);

        tokio::spawn(async move {
            // Held until the connection finishes
            let _permit = permit;
            let mut connection = Connection::new(connection_id, socket, peer_addr, config, router);

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    connection = connection_id,
                    error = %e,
                    "Connection error"
                );
            }
        });
    }
}
