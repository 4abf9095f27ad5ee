use std::net::SocketAddr;

use netsock_frame::{DataPacket, FrameConfig, FramedSocket};
use netsock_transport::{resolve_ipv4, Mode, SocketConfig, SocketKind};
use tracing::{debug, info};

use crate::error::{EndpointError, Result};

/// A UDP socket bound to a local port, exchanging one framed packet per
/// datagram with arbitrary peers.
///
/// Received datagrams feed the same reassembly buffer a stream would, so by
/// default a frame may span datagrams. The flip side is that one truncated
/// or foreign datagram leaves bytes behind that get joined with the next
/// datagram, and framing stays off from then on. Set
/// [`FrameConfig::discard_partial_datagrams`] to drop such leftovers before
/// each read instead.
pub struct UdpEndpoint {
    socket: FramedSocket,
}

impl UdpEndpoint {
    /// Create an unbound endpoint.
    pub fn new(mode: Mode) -> Self {
        Self::with_config(SocketConfig::with_mode(mode), FrameConfig::default())
    }

    /// Create an unbound endpoint with explicit configuration.
    pub fn with_config(socket_config: SocketConfig, frame_config: FrameConfig) -> Self {
        Self {
            socket: FramedSocket::with_config(socket_config, frame_config),
        }
    }

    /// Bind to `0.0.0.0:port`. Port 0 picks an ephemeral port.
    pub fn bind(&mut self, port: u16) -> Result<()> {
        if self.is_bound() {
            return Err(EndpointError::AlreadyBound);
        }

        self.socket.open(SocketKind::Udp)?;
        if let Err(err) = self.socket.bind_local(port) {
            let _ = self.socket.close();
            return Err(err.into());
        }

        info!(addr = ?self.socket.local_addr().ok(), "udp endpoint bound");
        Ok(())
    }

    /// Release the local port.
    pub fn unbind(&mut self) -> Result<()> {
        if !self.is_bound() {
            return Err(EndpointError::NotBound);
        }
        self.socket.close()?;
        debug!("udp endpoint unbound");
        Ok(())
    }

    /// Send the packet as one datagram to `host:port`.
    ///
    /// An unresolvable destination is reported before anything is sent and
    /// leaves the endpoint bound.
    pub fn send_to(&mut self, packet: &mut DataPacket, host: &str, port: u16) -> Result<()> {
        self.ensure_bound()?;
        let destination = resolve_ipv4(host, port)?;
        self.send_to_addr(packet, destination)
    }

    /// Send the packet as one datagram to a resolved address.
    pub fn send_to_addr(&mut self, packet: &mut DataPacket, destination: SocketAddr) -> Result<()> {
        self.ensure_bound()?;
        Ok(self.socket.send_frame(packet, Some(destination))?)
    }

    /// Send raw bytes as one datagram, bypassing framing.
    pub fn send_raw_to(&mut self, bytes: &[u8], host: &str, port: u16) -> Result<usize> {
        self.ensure_bound()?;
        let destination = resolve_ipv4(host, port)?;
        Ok(self.socket.send_raw(bytes, Some(destination))?)
    }

    /// Receive the next packet from any peer.
    pub fn receive(&mut self) -> Result<DataPacket> {
        self.receive_from().map(|(packet, _)| packet)
    }

    /// Receive the next packet into `packet`, replacing its contents.
    pub fn receive_into(&mut self, packet: &mut DataPacket) -> Result<()> {
        *packet = self.receive()?;
        Ok(())
    }

    /// Receive the next packet along with the address of the datagram that
    /// completed it. The address is `None` only when the frame was assembled
    /// entirely from bytes buffered by an earlier call.
    pub fn receive_from(&mut self) -> Result<(DataPacket, Option<SocketAddr>)> {
        self.ensure_bound()?;
        Ok(self.socket.receive_frame_from()?)
    }

    /// Receive one datagram verbatim.
    pub fn receive_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_bound()?;
        Ok(self.socket.receive_raw(buf)?)
    }

    /// Receive one datagram verbatim along with its source.
    pub fn receive_raw_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.ensure_bound()?;
        Ok(self.socket.receive_raw_from(buf)?)
    }

    pub fn is_bound(&self) -> bool {
        self.socket.is_open()
    }

    pub fn mode(&self) -> Mode {
        self.socket.mode()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.ensure_bound()?;
        Ok(self.socket.local_addr()?)
    }

    fn ensure_bound(&self) -> Result<()> {
        if self.is_bound() {
            Ok(())
        } else {
            Err(EndpointError::NotBound)
        }
    }
}

impl Drop for UdpEndpoint {
    fn drop(&mut self) {
        if self.is_bound() {
            let _ = self.unbind();
        }
    }
}

impl std::fmt::Debug for UdpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpEndpoint")
            .field("bound", &self.is_bound())
            .field("mode", &self.mode())
            .finish()
    }
}
