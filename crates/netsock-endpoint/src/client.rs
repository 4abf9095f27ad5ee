use std::net::SocketAddr;

use netsock_frame::{DataPacket, FrameConfig, FrameError, FramedSocket};
use netsock_transport::{resolve_ipv4, Mode, RawSocket, SocketConfig, SocketKind};
use tracing::debug;

use crate::error::{is_already_disconnected, EndpointError, Result};

/// A TCP client exchanging framed packets with one peer.
///
/// States: disconnected → connected → disconnected. Every transfer fails
/// with [`EndpointError::NotConnected`] while disconnected.
pub struct TcpClient {
    socket: FramedSocket,
}

impl TcpClient {
    /// Create a disconnected client.
    pub fn new(mode: Mode) -> Self {
        Self::with_config(SocketConfig::with_mode(mode), FrameConfig::default())
    }

    /// Create a disconnected client with explicit configuration.
    pub fn with_config(socket_config: SocketConfig, frame_config: FrameConfig) -> Self {
        Self {
            socket: FramedSocket::with_config(socket_config, frame_config),
        }
    }

    /// Connect to `host:port` (IPv4 literal or resolvable name).
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.is_connected() {
            return Err(EndpointError::AlreadyConnected);
        }
        let addr = resolve_ipv4(host, port)?;
        self.connect_addr(addr)
    }

    /// Connect to an already resolved address.
    ///
    /// On failure the half-open handle is released and the client stays
    /// disconnected.
    pub fn connect_addr(&mut self, addr: SocketAddr) -> Result<()> {
        if self.is_connected() {
            return Err(EndpointError::AlreadyConnected);
        }

        self.socket.open(SocketKind::Tcp)?;
        if let Err(err) = self.socket.connect(addr) {
            let _ = self.socket.close();
            return Err(err.into());
        }
        Ok(())
    }

    /// Shut down and close the connection.
    ///
    /// The client is disconnected afterwards even if an error is reported.
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(EndpointError::NotConnected);
        }

        let shutdown = self.socket.shutdown();
        let closed = self.socket.close();

        match shutdown {
            Err(FrameError::Transport(err)) if is_already_disconnected(&err) => {
                debug!("peer already disconnected");
            }
            Err(err) => return Err(err.into()),
            Ok(()) => {}
        }
        closed?;
        Ok(())
    }

    /// Send the packet as one frame; the packet is drained on success.
    ///
    /// In non-blocking mode `Unavailable` leaves the packet untouched for a
    /// retry. A frame the socket only partly took is still reported as sent;
    /// its tail is written before the next frame or by [`flush`](Self::flush).
    pub fn send(&mut self, packet: &mut DataPacket) -> Result<()> {
        self.ensure_connected()?;
        Ok(self.socket.send_frame(packet, None)?)
    }

    /// Write out the tail of a partly sent frame, if any.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_connected()?;
        Ok(self.socket.flush_pending()?)
    }

    /// Bytes of a partly sent frame still queued.
    pub fn pending_send_len(&self) -> usize {
        self.socket.pending_len()
    }

    /// Send raw bytes once, returning how many were written.
    ///
    /// Mixing raw and framed transfers on one connection will desynchronize
    /// the peer's reassembly.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<usize> {
        self.ensure_connected()?;
        Ok(self.socket.send_raw(bytes, None)?)
    }

    /// Receive the next complete packet.
    pub fn receive(&mut self) -> Result<DataPacket> {
        self.ensure_connected()?;
        Ok(self.socket.receive_frame()?)
    }

    /// Receive the next complete packet into `packet`, replacing its contents.
    pub fn receive_into(&mut self, packet: &mut DataPacket) -> Result<()> {
        *packet = self.receive()?;
        Ok(())
    }

    /// Receive raw bytes once, bypassing framing.
    pub fn receive_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_connected()?;
        Ok(self.socket.receive_raw(buf)?)
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_open()
    }

    pub fn mode(&self) -> Mode {
        self.socket.mode()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.ensure_connected()?;
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.ensure_connected()?;
        Ok(self.socket.peer_addr()?)
    }

    /// Take ownership of a freshly accepted connection.
    pub(crate) fn attach(&mut self, raw: RawSocket) {
        self.socket.adopt(raw);
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(EndpointError::NotConnected)
        }
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        if self.is_connected() {
            if let Err(err) = self.disconnect() {
                debug!(error = %err, "disconnect on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("connected", &self.is_connected())
            .field("mode", &self.mode())
            .finish()
    }
}
