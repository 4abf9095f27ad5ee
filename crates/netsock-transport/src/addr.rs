use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{Result, TransportError};

/// Resolve `host:port` to the first IPv4 socket address.
///
/// Sockets are created in the IPv4 family, so IPv6-only results are rejected.
/// Resolution never touches an open handle.
pub fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr> {
    let candidates = (host, port)
        .to_socket_addrs()
        .map_err(|err| TransportError::InvalidAddress(format!("{host}:{port} ({err})")))?;

    candidates
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| TransportError::InvalidAddress(format!("{host}:{port} (no IPv4 address)")))
}
