//! Per-connection handling
//!
//! One request per connection. A long poll keeps the connection open until
//! a message arrives, the poll times out, or the client goes away; in the
//! last case the wait future is dropped, which unregisters the subscriber.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

use super::config::ServerConfig;
use super::http::{read_request, Response};
use super::routes::{Action, Router};

/// Most unread request bytes discarded after an error response
const DRAIN_LIMIT: usize = 256 * 1024;

/// How long to keep discarding before closing anyway
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A single client connection
pub struct Connection {
    id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    router: Arc<Router>,
}

impl Connection {
    pub fn new(
        id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        router: Arc<Router>,
    ) -> Self {
        Self {
            id,
            socket,
            peer_addr,
            config,
            router,
        }
    }

    /// Serve one request and close
    pub async fn run(&mut self) -> Result<()> {
        let limits = self.config.request_limits();
        let read = read_request(&mut self.socket, &limits);

        let request = match tokio::time::timeout(self.config.request_timeout, read).await {
            Ok(Ok(request)) => request,
            Ok(Err(Error::Http(e))) => {
                if let Some(response) = Response::for_error(&e) {
                    response.write_to(&mut self.socket).await?;
                    // Unread input at close turns the FIN into a reset
                    self.socket.shutdown().await?;
                    discard_input(&mut self.socket).await;
                }
                return Err(e.into());
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::debug!(connection = self.id, peer = %self.peer_addr, "Request timed out");
                return Ok(());
            }
        };

        tracing::debug!(
            connection = self.id,
            peer = %self.peer_addr,
            method = %request.method,
            path = %request.path,
            "Request"
        );

        let response = match self.router.route(&request, self.peer_addr).await {
            Action::Respond(response) => response,
            Action::LongPoll(handle) => {
                let broadcaster = Arc::clone(self.router.broadcaster());

                tokio::select! {
                    message = broadcaster.poll(handle) => Router::poll_response(message),
                    _ = peer_closed(&mut self.socket) => {
                        tracing::debug!(
                            connection = self.id,
                            peer = %self.peer_addr,
                            "Client left during long poll"
                        );
                        return Ok(());
                    }
                }
            }
        };

        response.write_to(&mut self.socket).await?;
        self.socket.shutdown().await?;

        Ok(())
    }
}

/// Resolves once the peer closes its side of the connection
async fn peer_closed(socket: &mut TcpStream) {
    let mut scratch = [0u8; 512];
    loop {
        match socket.read(&mut scratch).await {
            Ok(0) | Err(_) => return,
            // Stray bytes after the request are ignored
            Ok(_) => continue,
        }
    }
}

/// Read and drop whatever the peer is still sending, within bounds
async fn discard_input(socket: &mut TcpStream) {
    let drain = async move {
        let mut scratch = [0u8; 4096];
        let mut discarded = 0;
        while discarded < DRAIN_LIMIT {
            match socket.read(&mut scratch).await {
                Ok(0) | Err(_) => break,
                Ok(n) => discarded += n,
            }
        }
        discarded
    };

    if let Ok(discarded) = tokio::time::timeout(DRAIN_TIMEOUT, drain).await {
        tracing::trace!(bytes = discarded, "Discarded unread request input");
    }
}
