use std::io::ErrorKind;
use std::net::SocketAddr;

use bytes::BytesMut;
use netsock_transport::{Mode, RawSocket, SocketConfig, SocketKind, TransportError};
use tracing::debug;

use crate::codec::{encode_frame, FrameConfig, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};
use crate::packet::DataPacket;
use crate::reassembler::FrameReassembler;

/// A [`RawSocket`] paired with the residual buffer of its frame reassembler.
///
/// This is the transport primitive the facades are built on: raw transfers,
/// framed transfers, and the open/bind/connect/close lifecycle of one handle.
///
/// A stream frame the OS only partly accepted stays queued in `send_buf`;
/// `send_offset` counts the bytes of it already written.
pub struct FramedSocket {
    raw: RawSocket,
    reassembler: FrameReassembler,
    send_buf: BytesMut,
    send_offset: usize,
}

impl FramedSocket {
    /// Create a closed socket that will use `mode` once opened.
    pub fn new(mode: Mode) -> Self {
        Self::with_config(SocketConfig::with_mode(mode), FrameConfig::default())
    }

    /// Create a closed socket with explicit configuration.
    pub fn with_config(socket_config: SocketConfig, frame_config: FrameConfig) -> Self {
        Self::from_raw(RawSocket::with_config(socket_config), frame_config)
    }

    /// Take ownership of an existing handle, e.g. one returned by `accept`.
    pub fn from_raw(raw: RawSocket, frame_config: FrameConfig) -> Self {
        Self {
            raw,
            reassembler: FrameReassembler::with_config(frame_config),
            send_buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            send_offset: 0,
        }
    }

    /// Replace the handle with `raw`, discarding any partial frame.
    ///
    /// The previous handle, if any, is dropped (and thereby closed).
    pub fn adopt(&mut self, raw: RawSocket) {
        self.reassembler.clear();
        self.discard_pending();
        self.raw = raw;
    }

    /// Allocate an OS handle for `kind`.
    pub fn open(&mut self, kind: SocketKind) -> Result<()> {
        self.raw.open(kind)?;
        self.reassembler.clear();
        self.discard_pending();
        Ok(())
    }

    /// Bind to the wildcard address on `port`.
    pub fn bind_local(&self, port: u16) -> Result<()> {
        Ok(self.raw.bind_local(port)?)
    }

    /// Connect to `addr`.
    pub fn connect(&self, addr: SocketAddr) -> Result<()> {
        Ok(self.raw.connect(addr)?)
    }

    /// Send bytes verbatim, once. See [`RawSocket::send_raw`].
    pub fn send_raw(&self, bytes: &[u8], destination: Option<SocketAddr>) -> Result<usize> {
        Ok(self.raw.send_raw(bytes, destination)?)
    }

    /// Receive once, bypassing the reassembler.
    ///
    /// Mixing raw receives with [`receive_frame`](Self::receive_frame) on the
    /// same stream will desynchronize the framing.
    pub fn receive_raw(&self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.raw.receive_raw(buf)?)
    }

    /// Receive one datagram, bypassing the reassembler.
    pub fn receive_raw_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.raw.receive_raw_from(buf)?)
    }

    /// Send the packet's unread bytes as one length-prefixed frame.
    ///
    /// With a destination (or on a datagram socket) the frame goes out as a
    /// single datagram. On a stream, the tail of an earlier frame that is
    /// still queued is written first.
    ///
    /// `Unavailable` means none of this packet was accepted: the packet is
    /// left untouched and the call can be repeated with it. Once any byte of
    /// the frame has been written, the rest is queued, the packet is drained
    /// and `Ok` is returned; the queued tail goes out on the next send or
    /// [`flush_pending`](Self::flush_pending). No call ever waits for the
    /// peer in non-blocking mode.
    pub fn send_frame(
        &mut self,
        packet: &mut DataPacket,
        destination: Option<SocketAddr>,
    ) -> Result<()> {
        self.flush_pending()?;

        encode_frame(packet.payload(), &mut self.send_buf)?;

        let datagram =
            destination.is_some() || self.raw.kind().is_some_and(|kind| !kind.is_stream());
        if datagram {
            let sent = self.send_datagram(destination);
            self.discard_pending();
            sent?;
        } else {
            match self.write_pending() {
                Ok(()) => {}
                Err(FrameError::Unavailable) if self.send_offset > 0 => {
                    debug!(queued = self.pending_len(), "frame partially sent");
                }
                Err(err) => {
                    self.discard_pending();
                    return Err(err);
                }
            }
        }

        debug!(
            len = packet.len(),
            ?destination,
            "frame sent"
        );
        packet.clear();
        Ok(())
    }

    /// Write out the queued tail of a partially sent stream frame.
    ///
    /// Returns `Ok` once nothing is queued, `Unavailable` while the socket
    /// still cannot take the rest. Any other error drops the tail.
    pub fn flush_pending(&mut self) -> Result<()> {
        if !self.raw.is_open() {
            return Err(TransportError::Closed.into());
        }

        match self.write_pending() {
            Err(err) if !err.is_unavailable() => {
                self.discard_pending();
                Err(err)
            }
            other => other,
        }
    }

    /// Bytes of a partially sent frame still waiting to be written.
    pub fn pending_len(&self) -> usize {
        self.send_buf.len() - self.send_offset
    }

    fn send_datagram(&mut self, destination: Option<SocketAddr>) -> Result<()> {
        let sent = self.raw.send_raw(&self.send_buf, destination)?;
        if sent != self.send_buf.len() {
            return Err(FrameError::Io(std::io::Error::new(
                ErrorKind::WriteZero,
                format!("datagram truncated ({sent} of {} bytes)", self.send_buf.len()),
            )));
        }
        Ok(())
    }

    /// Write `send_buf` from `send_offset` on, stopping at the first
    /// `Unavailable` with the offset kept.
    fn write_pending(&mut self) -> Result<()> {
        while self.send_offset < self.send_buf.len() {
            match self.raw.send_raw(&self.send_buf[self.send_offset..], None) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.send_offset += n,
                Err(TransportError::Unavailable) => return Err(FrameError::Unavailable),
                Err(TransportError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        self.discard_pending();
        Ok(())
    }

    fn discard_pending(&mut self) {
        self.send_buf.clear();
        self.send_offset = 0;
    }

    /// Return the next complete frame.
    ///
    /// Frames already buffered are returned first. In non-blocking mode a
    /// frame that is not complete yet reports `Unavailable` and the partial
    /// bytes are kept for the next call.
    pub fn receive_frame(&mut self) -> Result<DataPacket> {
        if !self.raw.is_open() {
            return Err(TransportError::Closed.into());
        }

        let packet = if self.datagram_bounded() {
            let raw = &self.raw;
            self.reassembler
                .receive_datagram_with(|buf| raw.receive_raw(buf).map_err(TransportError::into_io))?
        } else {
            self.reassembler.receive_from(&mut self.raw)?
        };
        debug!(
            len = packet.len(),
            residual = self.reassembler.residual_len(),
            "frame received"
        );
        Ok(packet)
    }

    /// Return the next complete frame together with the source of the
    /// datagram that completed it.
    ///
    /// Returns `None` as the source when the frame was already buffered
    /// before this call and no datagram was read.
    pub fn receive_frame_from(&mut self) -> Result<(DataPacket, Option<SocketAddr>)> {
        if !self.raw.is_open() {
            return Err(TransportError::Closed.into());
        }

        let datagram_bounded = self.datagram_bounded();
        let raw = &self.raw;
        let mut source = None;
        let read_raw = |buf: &mut [u8]| {
            let (read, from) = raw.receive_raw_from(buf).map_err(TransportError::into_io)?;
            source = Some(from);
            Ok::<_, std::io::Error>(read)
        };
        let packet = if datagram_bounded {
            self.reassembler.receive_datagram_with(read_raw)?
        } else {
            self.reassembler.receive_with(read_raw)?
        };
        debug!(len = packet.len(), ?source, "frame received");
        Ok((packet, source))
    }

    fn datagram_bounded(&self) -> bool {
        self.reassembler.config().discard_partial_datagrams
            && self.raw.kind().is_some_and(|kind| !kind.is_stream())
    }

    /// Shut down both directions of a connected stream.
    pub fn shutdown(&self) -> Result<()> {
        Ok(self.raw.shutdown()?)
    }

    /// Release the OS handle and discard any partial frame, received or
    /// queued for sending.
    ///
    /// The socket is closed afterwards even when the OS reports an error.
    pub fn close(&mut self) -> Result<()> {
        self.reassembler.clear();
        self.discard_pending();
        Ok(self.raw.close()?)
    }

    pub fn is_open(&self) -> bool {
        self.raw.is_open()
    }

    pub fn mode(&self) -> Mode {
        self.raw.mode()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.raw.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.raw.peer_addr()?)
    }

    /// Bytes received but not yet returned as a frame.
    pub fn residual_len(&self) -> usize {
        self.reassembler.residual_len()
    }
}

impl std::fmt::Debug for FramedSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedSocket")
            .field("raw", &self.raw)
            .field("residual", &self.reassembler.residual_len())
            .field("pending", &self.pending_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::{Duration, Instant};

    use netsock_transport::MAX_BACKLOG;

    use super::*;
    use crate::codec::MAX_PAYLOAD;

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    fn bound_udp(mode: Mode) -> FramedSocket {
        let mut socket = FramedSocket::new(mode);
        socket.open(SocketKind::Udp).unwrap();
        socket.bind_local(0).unwrap();
        socket
    }

    /// A connected (client, server) pair over loopback TCP.
    fn tcp_pair(server_mode: Mode) -> (FramedSocket, FramedSocket) {
        tcp_pair_with(Mode::Blocking, server_mode)
    }

    fn tcp_pair_with(client_mode: Mode, server_mode: Mode) -> (FramedSocket, FramedSocket) {
        let mut listener = RawSocket::new(server_mode);
        listener.open(SocketKind::Tcp).unwrap();
        listener.bind_local(0).unwrap();
        listener.listen(MAX_BACKLOG).unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = FramedSocket::new(client_mode);
        client.open(SocketKind::Tcp).unwrap();
        client.connect(loopback(port)).unwrap();

        let accepted = loop {
            match listener.accept() {
                Ok(raw) => break raw,
                Err(err) if err.is_unavailable() => std::thread::sleep(Duration::from_millis(5)),
                Err(err) => panic!("accept failed: {err}"),
            }
        };
        (client, FramedSocket::from_raw(accepted, FrameConfig::default()))
    }

    #[test]
    fn udp_scenario_u32_and_text() {
        let mut receiver = bound_udp(Mode::Blocking);
        let mut sender = bound_udp(Mode::Blocking);
        let port = receiver.local_addr().unwrap().port();

        let mut packet = DataPacket::new();
        packet.write(42u32).unwrap().write("hi").unwrap();
        sender.send_frame(&mut packet, Some(loopback(port))).unwrap();
        assert!(packet.is_drained());

        let mut received = receiver.receive_frame().unwrap();
        assert_eq!(received.read::<u32>().unwrap(), 42);
        assert_eq!(received.read::<String>().unwrap(), "hi");
        assert!(received.is_drained());
    }

    #[test]
    fn udp_receive_frame_from_reports_source() {
        let mut receiver = bound_udp(Mode::Blocking);
        let mut sender = bound_udp(Mode::Blocking);
        let dest = loopback(receiver.local_addr().unwrap().port());

        let mut packet = DataPacket::new();
        packet.write("who").unwrap();
        sender.send_frame(&mut packet, Some(dest)).unwrap();

        let (mut received, source) = receiver.receive_frame_from().unwrap();
        assert_eq!(received.read::<String>().unwrap(), "who");
        assert_eq!(
            source.map(|addr| addr.port()),
            Some(sender.local_addr().unwrap().port())
        );
    }

    #[test]
    fn tcp_frames_roundtrip_in_order() {
        let (mut client, mut server) = tcp_pair(Mode::Blocking);

        for i in 0..16u16 {
            let mut packet = DataPacket::new();
            packet.write(i).unwrap().write(format!("msg-{i}")).unwrap();
            client.send_frame(&mut packet, None).unwrap();
        }

        for i in 0..16u16 {
            let mut packet = server.receive_frame().unwrap();
            assert_eq!(packet.read::<u16>().unwrap(), i);
            assert_eq!(packet.read::<String>().unwrap(), format!("msg-{i}"));
        }
        assert_eq!(server.residual_len(), 0);
    }

    #[test]
    fn tcp_largest_frame_roundtrips() {
        let (mut client, mut server) = tcp_pair(Mode::Blocking);
        let payload: Vec<u8> = (0..MAX_PAYLOAD).map(|i| (i % 251) as u8).collect();

        let writer = std::thread::spawn(move || {
            let mut packet = DataPacket::from_payload(&payload);
            client.send_frame(&mut packet, None).unwrap();
            payload
        });

        let received = server.receive_frame().unwrap();
        let payload = writer.join().unwrap();
        assert_eq!(received.payload(), payload.as_slice());
    }

    #[test]
    fn nonblocking_receive_without_data_is_unavailable() {
        let (_client, mut server) = tcp_pair(Mode::NonBlocking);
        assert_eq!(server.mode(), Mode::NonBlocking);

        let err = server.receive_frame().unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(server.residual_len(), 0);
    }

    #[test]
    fn nonblocking_partial_frame_carries_over() {
        let (client, mut server) = tcp_pair(Mode::NonBlocking);

        let mut wire = BytesMut::new();
        encode_frame(b"split-frame", &mut wire).unwrap();
        let (head, tail) = wire.split_at(5);

        client.send_raw(head, None).unwrap();
        let err = loop {
            match server.receive_frame() {
                Err(err) if err.is_unavailable() && server.residual_len() == head.len() => {
                    break err
                }
                Err(err) if err.is_unavailable() => std::thread::sleep(Duration::from_millis(5)),
                other => panic!("unexpected receive result: {other:?}"),
            }
        };
        assert!(err.is_unavailable());

        client.send_raw(tail, None).unwrap();
        let packet = loop {
            match server.receive_frame() {
                Ok(packet) => break packet,
                Err(err) if err.is_unavailable() => std::thread::sleep(Duration::from_millis(5)),
                Err(err) => panic!("receive failed: {err}"),
            }
        };
        assert_eq!(packet.payload(), b"split-frame");
        assert_eq!(server.residual_len(), 0);
    }

    #[test]
    fn oversized_packet_is_rejected_and_kept() {
        let mut sender = bound_udp(Mode::Blocking);
        let mut packet = DataPacket::from_payload(&vec![1u8; MAX_PAYLOAD + 1]);

        let err = sender
            .send_frame(&mut packet, Some(loopback(9)))
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert_eq!(packet.len(), MAX_PAYLOAD + 1);
    }

    #[test]
    fn closed_socket_rejects_frames() {
        let mut socket = FramedSocket::new(Mode::Blocking);
        let mut packet = DataPacket::new();
        packet.write(1u8).unwrap();

        assert!(matches!(
            socket.send_frame(&mut packet, None),
            Err(FrameError::Transport(TransportError::Closed))
        ));
        assert_eq!(packet.len(), 1);
        assert!(matches!(
            socket.receive_frame(),
            Err(FrameError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn peer_close_surfaces_connection_closed() {
        let (mut client, mut server) = tcp_pair(Mode::Blocking);
        client.shutdown().unwrap();
        client.close().unwrap();

        let err = server.receive_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn close_discards_partial_frame() {
        let (client, mut server) = tcp_pair(Mode::NonBlocking);
        client.send_raw(&[0x00, 0x09, b'x'], None).unwrap();

        while server.residual_len() == 0 {
            match server.receive_frame() {
                Err(err) if err.is_unavailable() => std::thread::sleep(Duration::from_millis(5)),
                other => panic!("unexpected receive result: {other:?}"),
            }
        }
        server.close().unwrap();
        assert_eq!(server.residual_len(), 0);
        assert!(!server.is_open());
    }

    #[test]
    fn nonblocking_send_backpressure_returns_and_resumes() {
        let (mut client, server) = tcp_pair_with(Mode::NonBlocking, Mode::Blocking);
        let filler = vec![0xA5u8; MAX_PAYLOAD - 4];

        // The peer never reads, so the send buffer fills up.
        let started = Instant::now();
        let mut accepted = 0u32;
        let mut rejected = loop {
            let mut packet = DataPacket::new();
            packet.write(accepted).unwrap().write_bytes(&filler);
            match client.send_frame(&mut packet, None) {
                Ok(()) => {
                    assert!(packet.is_drained());
                    accepted += 1;
                }
                Err(err) if err.is_unavailable() => break packet,
                Err(err) => panic!("send failed: {err}"),
            }
            assert!(accepted < 4096, "send buffer never filled");
        };
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(rejected.len(), MAX_PAYLOAD);

        let expected = accepted + 1;
        let reader = std::thread::spawn(move || {
            let mut server = server;
            (0..expected)
                .map(|_| {
                    let mut packet = server.receive_frame().unwrap();
                    let seq = packet.read::<u32>().unwrap();
                    assert_eq!(packet.len(), MAX_PAYLOAD - 4);
                    assert!(packet.payload().iter().all(|byte| *byte == 0xA5));
                    seq
                })
                .collect::<Vec<_>>()
        });

        loop {
            match client.send_frame(&mut rejected, None) {
                Ok(()) => break,
                Err(err) if err.is_unavailable() => std::thread::sleep(Duration::from_millis(1)),
                Err(err) => panic!("retry failed: {err}"),
            }
        }
        assert!(rejected.is_drained());

        while client.pending_len() > 0 {
            match client.flush_pending() {
                Ok(()) => {}
                Err(err) if err.is_unavailable() => std::thread::sleep(Duration::from_millis(1)),
                Err(err) => panic!("flush failed: {err}"),
            }
        }

        let received = reader.join().unwrap();
        assert_eq!(received, (0..expected).collect::<Vec<_>>());
    }

    #[test]
    fn flush_without_pending_frame_is_a_no_op() {
        let (mut client, _server) = tcp_pair_with(Mode::NonBlocking, Mode::Blocking);
        assert_eq!(client.pending_len(), 0);
        client.flush_pending().unwrap();

        client.close().unwrap();
        assert!(matches!(
            client.flush_pending(),
            Err(FrameError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn udp_partial_datagram_is_discarded_when_configured() {
        let config = FrameConfig {
            discard_partial_datagrams: true,
            ..FrameConfig::default()
        };
        let mut receiver = FramedSocket::with_config(SocketConfig::default(), config);
        receiver.open(SocketKind::Udp).unwrap();
        receiver.bind_local(0).unwrap();
        let dest = loopback(receiver.local_addr().unwrap().port());
        let mut sender = bound_udp(Mode::Blocking);

        // Declares 8 payload bytes but carries 2.
        sender.send_raw(&[0x00, 0x08, b'o', b'k'], Some(dest)).unwrap();
        let mut packet = DataPacket::new();
        packet.write("next").unwrap();
        sender.send_frame(&mut packet, Some(dest)).unwrap();

        let mut received = receiver.receive_frame().unwrap();
        assert_eq!(received.read::<String>().unwrap(), "next");
        assert_eq!(receiver.residual_len(), 0);
    }
}
