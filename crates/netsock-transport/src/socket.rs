use std::io::{self, Read};
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, info, trace, warn};

use crate::config::{Mode, SocketConfig, SocketKind};
use crate::error::{Result, TransportError};

/// Listen queue depth used by [`RawSocket::listen`]: the platform maximum.
#[cfg(unix)]
pub const MAX_BACKLOG: i32 = libc::SOMAXCONN;
#[cfg(not(unix))]
pub const MAX_BACKLOG: i32 = 128;

/// One owned IPv4 socket handle plus the blocking mode it was created with.
///
/// A `RawSocket` starts closed. [`open`](Self::open) allocates the handle,
/// [`close`](Self::close) releases it; in between the raw send/receive calls
/// report one of three outcomes: bytes transferred, [`TransportError::Unavailable`]
/// (non-blocking mode, retry later) or a hard error.
pub struct RawSocket {
    handle: Option<Socket>,
    kind: Option<SocketKind>,
    config: SocketConfig,
}

impl RawSocket {
    /// Create a closed socket that will use `mode` once opened.
    pub fn new(mode: Mode) -> Self {
        Self::with_config(SocketConfig::with_mode(mode))
    }

    /// Create a closed socket with explicit configuration.
    pub fn with_config(config: SocketConfig) -> Self {
        Self {
            handle: None,
            kind: None,
            config,
        }
    }

    /// Allocate an OS handle for `kind`.
    pub fn open(&mut self, kind: SocketKind) -> Result<()> {
        if self.handle.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        let socket = match kind {
            SocketKind::Tcp => Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)),
            SocketKind::Udp => Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)),
        }
        .map_err(TransportError::Create)?;

        apply_options(&socket, &self.config).map_err(TransportError::Create)?;

        trace!(kind = kind.name(), mode = ?self.config.mode, "socket opened");
        self.handle = Some(socket);
        self.kind = Some(kind);
        Ok(())
    }

    /// Bind to the wildcard address on `port` (0 picks an ephemeral port).
    pub fn bind_local(&self, port: u16) -> Result<()> {
        let socket = self.handle()?;
        let bind_err = |source| TransportError::Bind { port, source };

        if self.config.reuse_address {
            socket.set_reuse_address(true).map_err(bind_err)?;
        }
        let addr = SockAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&addr).map_err(bind_err)?;

        info!(port, kind = self.kind_name(), "socket bound");
        Ok(())
    }

    /// Connect to `addr`.
    ///
    /// The connect itself always blocks; non-blocking mode applies to the
    /// transfers that follow it.
    pub fn connect(&self, addr: SocketAddr) -> Result<()> {
        let socket = self.handle()?;
        let connect_err = |source| TransportError::Connect { addr, source };

        let nonblocking = self.config.mode.is_nonblocking();
        if nonblocking {
            socket.set_nonblocking(false).map_err(connect_err)?;
        }
        socket.connect(&SockAddr::from(addr)).map_err(connect_err)?;
        if nonblocking {
            socket.set_nonblocking(true).map_err(connect_err)?;
        }

        info!(%addr, kind = self.kind_name(), "socket connected");
        Ok(())
    }

    /// Start accepting connections with the given queue depth.
    pub fn listen(&self, backlog: i32) -> Result<()> {
        self.handle()?
            .listen(backlog)
            .map_err(TransportError::Listen)?;
        debug!(backlog, "socket listening");
        Ok(())
    }

    /// Accept one pending connection.
    ///
    /// The new socket inherits this socket's configuration, including its
    /// blocking mode. In non-blocking mode an empty queue reports `Unavailable`.
    pub fn accept(&self) -> Result<RawSocket> {
        let (socket, peer) = match self.handle()?.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                return Err(TransportError::Unavailable)
            }
            Err(err) => return Err(TransportError::Accept(err)),
        };

        apply_options(&socket, &self.config).map_err(TransportError::Accept)?;
        debug!(peer = ?peer.as_socket(), "accepted connection");

        Ok(RawSocket {
            handle: Some(socket),
            kind: Some(SocketKind::Tcp),
            config: self.config.clone(),
        })
    }

    /// Send `bytes` once. With a destination this is an addressed (datagram)
    /// send, otherwise a connected send. Returns the number of bytes sent.
    pub fn send_raw(&self, bytes: &[u8], destination: Option<SocketAddr>) -> Result<usize> {
        let socket = self.handle()?;
        let sent = match destination {
            Some(addr) => socket.send_to(bytes, &SockAddr::from(addr)),
            None => socket.send(bytes),
        }
        .map_err(classify)?;

        trace!(sent, len = bytes.len(), ?destination, "raw send");
        Ok(sent)
    }

    /// Receive once into `buf`, returning the number of bytes read.
    ///
    /// For streams `Ok(0)` means the peer closed the connection. Zero-length
    /// datagrams carry nothing and are skipped.
    pub fn receive_raw(&self, buf: &mut [u8]) -> Result<usize> {
        let mut socket = self.handle()?;
        loop {
            let read = match socket.read(buf) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(classify(err)),
            };
            if read == 0 && self.kind == Some(SocketKind::Udp) && !buf.is_empty() {
                trace!("skipping empty datagram");
                continue;
            }
            trace!(read, "raw receive");
            return Ok(read);
        }
    }

    /// Receive one datagram into `buf`, reporting its source address.
    ///
    /// Zero-length datagrams are skipped, as in [`receive_raw`](Self::receive_raw).
    pub fn receive_raw_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let socket = self.handle()?;
        // SAFETY: `MaybeUninit<u8>` has the same layout as `u8`, and `recv_from`
        // only writes initialized bytes into the slice; it never de-initializes it.
        let uninit = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
        loop {
            let (read, from) = match socket.recv_from(uninit) {
                Ok(received) => received,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(classify(err)),
            };
            if read == 0 && self.kind == Some(SocketKind::Udp) && !uninit.is_empty() {
                trace!("skipping empty datagram");
                continue;
            }
            let from = to_inet(from)?;
            trace!(read, %from, "raw receive from");
            return Ok((read, from));
        }
    }

    /// Shut down both directions of a connected stream.
    pub fn shutdown(&self) -> Result<()> {
        self.handle()?.shutdown(Shutdown::Both)?;
        debug!("socket shut down");
        Ok(())
    }

    /// Release the OS handle.
    ///
    /// The socket is marked closed before the OS call, so it is never reused
    /// after a failed close; the failure is still reported as
    /// [`TransportError::Close`].
    pub fn close(&mut self) -> Result<()> {
        let socket = self.handle.take().ok_or(TransportError::Closed)?;
        let kind = self.kind.take();
        match release(socket) {
            Ok(()) => {
                debug!(kind = kind.map(SocketKind::name), "socket closed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "socket close failed; handle discarded");
                Err(err)
            }
        }
    }

    /// Whether an OS handle is currently held.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Protocol of the open handle, `None` while closed.
    pub fn kind(&self) -> Option<SocketKind> {
        self.kind
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Local address of the open handle.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        to_inet(self.handle()?.local_addr()?)
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        to_inet(self.handle()?.peer_addr()?)
    }

    fn handle(&self) -> Result<&Socket> {
        self.handle.as_ref().ok_or(TransportError::Closed)
    }

    fn kind_name(&self) -> &'static str {
        self.kind.map(SocketKind::name).unwrap_or("closed")
    }
}

/// Raw receive as a plain `Read` source, so stream decoders can sit on top.
/// Errors are lowered with [`TransportError::into_io`].
impl Read for RawSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.receive_raw(buf).map_err(TransportError::into_io)
    }
}

impl std::fmt::Debug for RawSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSocket")
            .field("kind", &self.kind)
            .field("mode", &self.config.mode)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

fn apply_options(socket: &Socket, config: &SocketConfig) -> io::Result<()> {
    socket.set_nonblocking(config.mode.is_nonblocking())?;
    socket.set_read_timeout(config.read_timeout)?;
    socket.set_write_timeout(config.write_timeout)?;
    Ok(())
}

/// `EAGAIN`/`EWOULDBLOCK` (and timeout expiry) are transient; everything else is fatal.
fn classify(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::WouldBlock {
        TransportError::Unavailable
    } else {
        TransportError::Io(err)
    }
}

fn to_inet(addr: SockAddr) -> Result<SocketAddr> {
    addr.as_socket()
        .ok_or_else(|| TransportError::InvalidAddress("non-IP socket address".into()))
}

#[cfg(unix)]
fn release(socket: Socket) -> Result<()> {
    use std::os::fd::IntoRawFd;

    let fd = socket.into_raw_fd();
    // SAFETY: `fd` was just taken out of an owned `Socket`, so nothing else
    // refers to it and it is closed exactly once here.
    let rc = unsafe { libc::close(fd) };
    if rc == -1 {
        return Err(TransportError::Close(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn release(socket: Socket) -> Result<()> {
    drop(socket);
    Ok(())
}
