use std::net::SocketAddr;

use netsock_transport::{Mode, RawSocket, SocketConfig, SocketKind, MAX_BACKLOG};
use tracing::{debug, info};

use crate::client::TcpClient;
use crate::error::{EndpointError, Result};

/// Accepts TCP connections on a local port and hands each one to a
/// [`TcpClient`].
pub struct TcpListener {
    socket: RawSocket,
}

impl TcpListener {
    /// Create an idle listener.
    pub fn new(mode: Mode) -> Self {
        Self::with_config(SocketConfig::with_mode(mode))
    }

    /// Create an idle listener with explicit socket options. Accepted
    /// connections inherit them.
    pub fn with_config(config: SocketConfig) -> Self {
        Self {
            socket: RawSocket::with_config(config),
        }
    }

    /// Bind to `0.0.0.0:port` and start listening with the system's maximum
    /// backlog. Port 0 picks an ephemeral port; see [`local_addr`](Self::local_addr).
    pub fn begin_listening(&mut self, port: u16) -> Result<()> {
        if self.is_listening() {
            return Err(EndpointError::AlreadyListening);
        }

        self.socket.open(SocketKind::Tcp)?;
        let started = self
            .socket
            .bind_local(port)
            .and_then(|()| self.socket.listen(MAX_BACKLOG));
        if let Err(err) = started {
            let _ = self.socket.close();
            return Err(err.into());
        }

        info!(addr = ?self.socket.local_addr().ok(), "listening");
        Ok(())
    }

    /// Stop listening. Pending, unaccepted connections are dropped.
    pub fn end_listening(&mut self) -> Result<()> {
        if !self.is_listening() {
            return Err(EndpointError::NotListening);
        }
        self.socket.close()?;
        debug!("listener closed");
        Ok(())
    }

    /// Accept one pending connection into `client`.
    ///
    /// Blocks in blocking mode; reports unavailable in non-blocking mode when
    /// nothing is pending. A connected `client` is rejected before anything is
    /// dequeued.
    pub fn accept_new_client(&self, client: &mut TcpClient) -> Result<()> {
        if !self.is_listening() {
            return Err(EndpointError::NotListening);
        }
        if client.is_connected() {
            return Err(EndpointError::AlreadyConnected);
        }

        let accepted = self.socket.accept()?;
        client.attach(accepted);
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.socket.is_open()
    }

    pub fn mode(&self) -> Mode {
        self.socket.mode()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        if !self.is_listening() {
            return Err(EndpointError::NotListening);
        }
        Ok(self.socket.local_addr()?)
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        if self.is_listening() {
            let _ = self.end_listening();
        }
    }
}

impl std::fmt::Debug for TcpListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpListener")
            .field("listening", &self.is_listening())
            .field("mode", &self.mode())
            .finish()
    }
}
