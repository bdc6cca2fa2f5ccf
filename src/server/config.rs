//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::http::RequestLimits;

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 2004;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Directory holding the chat client
    pub public_dir: PathBuf,

    /// Address reported to browsers by `/api/room/details`
    ///
    /// `None` or a wildcard address means "discover the LAN address".
    pub advertised_address: Option<String>,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// A full request must arrive within this time
    pub request_timeout: Duration,

    /// Maximum size of request line plus headers
    pub max_head_size: usize,

    /// Maximum message body size
    pub max_body_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = RequestLimits::default();
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            public_dir: PathBuf::from("public"),
            advertised_address: None,
            max_connections: 0, // Unlimited
            request_timeout: Duration::from_secs(10),
            max_head_size: limits.max_head_size,
            max_body_size: limits.max_body_size,
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the listening port, keeping the bind IP
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the static file directory
    pub fn public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    /// Set the address reported to browsers
    pub fn advertised_address(mut self, addr: impl Into<String>) -> Self {
        self.advertised_address = Some(addr.into());
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum message body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Limits for the request reader
    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_head_size: self.max_head_size,
            max_body_size: self.max_body_size,
        }
    }
}
