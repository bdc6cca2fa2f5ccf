//! Local network address discovery

use std::io;
use std::net::IpAddr;

use tokio::net::UdpSocket;

/// Used only to pick an outbound interface; nothing is sent
const PROBE_ADDR: &str = "8.8.8.8:80";

/// Shown when no address can be discovered
pub const FALLBACK_HOST: &str = "localhost";

/// Best-effort LAN address of this machine
///
/// Connecting a UDP socket makes the OS choose the outbound interface
/// without sending a packet. Falls back to `localhost`.
pub async fn local_ip() -> String {
    match discover().await {
        Ok(ip) => ip.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "Local IP discovery failed");
            FALLBACK_HOST.to_string()
        }
    }
}

async fn discover() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(PROBE_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}

/// Whether `addr` is a wildcard that clients cannot connect to
pub fn is_unspecified(addr: &str) -> bool {
    addr.parse::<IpAddr>()
        .map(|ip| ip.is_unspecified())
        .unwrap_or(false)
}
