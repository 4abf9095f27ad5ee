use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{decode_frame, FrameConfig, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};
use crate::packet::DataPacket;

const INITIAL_RESIDUAL_CAPACITY: usize = 8 * 1024;

/// Turns raw reads into exactly one complete frame per successful call.
///
/// Bytes that arrive ahead of a complete frame are kept in a residual buffer
/// across calls, so a frame split over several reads (or interrupted by a
/// non-blocking "no data yet") is never lost or duplicated.
pub struct FrameReassembler {
    residual: BytesMut,
    scratch: Box<[u8]>,
    config: FrameConfig,
}

impl FrameReassembler {
    /// Create a reassembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a reassembler with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            residual: BytesMut::with_capacity(INITIAL_RESIDUAL_CAPACITY),
            scratch: vec![0u8; MAX_FRAME_SIZE].into_boxed_slice(),
            config,
        }
    }

    /// Return the next complete frame, reading from `source` as needed.
    ///
    /// A frame already present in the residual buffer is returned without
    /// touching `source`. Otherwise the loop reads until one completes:
    /// - `ErrorKind::WouldBlock` returns [`FrameError::Unavailable`] with the
    ///   residual bytes kept for the next call
    /// - `ErrorKind::Interrupted` is retried
    /// - a zero-byte read returns [`FrameError::ConnectionClosed`]
    /// - any other error is returned as-is
    pub fn receive_from<R: Read>(&mut self, source: &mut R) -> Result<DataPacket> {
        self.receive_with(|buf| source.read(buf))
    }

    /// Like [`receive_from`](Self::receive_from), with the raw read supplied as a closure.
    pub fn receive_with<F>(&mut self, read_raw: F) -> Result<DataPacket>
    where
        F: FnMut(&mut [u8]) -> std::io::Result<usize>,
    {
        self.receive_loop(read_raw, false)
    }

    /// Like [`receive_with`](Self::receive_with), for a source that yields
    /// whole datagrams: bytes left over from earlier datagrams that do not
    /// form a complete frame are dropped before each read.
    pub fn receive_datagram_with<F>(&mut self, read_raw: F) -> Result<DataPacket>
    where
        F: FnMut(&mut [u8]) -> std::io::Result<usize>,
    {
        self.receive_loop(read_raw, true)
    }

    fn receive_loop<F>(&mut self, mut read_raw: F, datagram_bounded: bool) -> Result<DataPacket>
    where
        F: FnMut(&mut [u8]) -> std::io::Result<usize>,
    {
        loop {
            if let Some(packet) = self.next_frame()? {
                return Ok(packet);
            }

            if datagram_bounded && !self.residual.is_empty() {
                debug!(dropped = self.residual.len(), "discarding partial datagram bytes");
                self.residual.clear();
            }

            let read = match read_raw(&mut self.scratch[..]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    trace!(residual = self.residual.len(), "no data available");
                    return Err(FrameError::Unavailable);
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            trace!(read, residual = self.residual.len(), "buffered raw bytes");
            self.residual.extend_from_slice(&self.scratch[..read]);
        }
    }

    /// Extract one complete frame from bytes already buffered, if any.
    pub fn next_frame(&mut self) -> Result<Option<DataPacket>> {
        let payload = decode_frame(&mut self.residual, self.config.payload_limit())?;
        Ok(payload.map(DataPacket::from_bytes))
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn residual_len(&self) -> usize {
        self.residual.len()
    }

    /// Drop any partially received frame.
    pub fn clear(&mut self) {
        self.residual.clear();
    }

    /// Current reassembler configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameReassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReassembler")
            .field("residual", &self.residual.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, MAX_PAYLOAD};

    fn wire<P: AsRef<[u8]>>(payloads: &[P]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload.as_ref(), &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut source = Cursor::new(wire(&[b"hello"]));
        let mut reassembler = FrameReassembler::new();

        let packet = reassembler.receive_from(&mut source).unwrap();
        assert_eq!(packet.payload(), b"hello");
        assert_eq!(reassembler.residual_len(), 0);
    }

    #[test]
    fn two_frames_in_one_chunk_come_out_in_order() {
        let mut source = Cursor::new(wire(&[b"one", b"two"]));
        let mut reassembler = FrameReassembler::new();

        let first = reassembler.receive_from(&mut source).unwrap();
        assert_eq!(first.payload(), b"one");
        assert_eq!(reassembler.residual_len(), 2 + 3);

        let second = reassembler.receive_from(&mut source).unwrap();
        assert_eq!(second.payload(), b"two");
        assert_eq!(reassembler.residual_len(), 0);
    }

    #[test]
    fn byte_by_byte_delivery() {
        let mut packet = DataPacket::new();
        packet.write(42u32).unwrap().write("slow").unwrap();
        let bytes = wire(&[packet.payload()]);

        let mut source = ScriptedSource::chunked(&bytes, 1);
        let mut reassembler = FrameReassembler::new();

        let mut received = reassembler.receive_from(&mut source).unwrap();
        assert_eq!(received.read::<u32>().unwrap(), 42);
        assert_eq!(received.read::<String>().unwrap(), "slow");
        assert!(received.is_drained());
        assert_eq!(reassembler.residual_len(), 0);
    }

    #[test]
    fn arbitrary_chunk_sizes() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let bytes = wire(&[&payload]);

        for chunk in [1, 2, 3, 7, 64, 999, 1001, 1002, 4096] {
            let mut source = ScriptedSource::chunked(&bytes, chunk);
            let mut reassembler = FrameReassembler::new();
            let packet = reassembler.receive_from(&mut source).unwrap();
            assert_eq!(packet.payload(), payload.as_slice(), "chunk size {chunk}");
            assert_eq!(reassembler.residual_len(), 0, "chunk size {chunk}");
        }
    }

    #[test]
    fn largest_payload_roundtrips() {
        let payload = vec![0xAB; MAX_PAYLOAD];
        let bytes = wire(&[&payload]);

        let mut source = ScriptedSource::chunked(&bytes, 1500);
        let mut reassembler = FrameReassembler::new();
        let packet = reassembler.receive_from(&mut source).unwrap();
        assert_eq!(packet.len(), MAX_PAYLOAD);
        assert_eq!(reassembler.residual_len(), 0);
    }

    #[test]
    fn empty_payload_frame() {
        let mut source = Cursor::new(wire(&[b""]));
        let mut reassembler = FrameReassembler::new();
        let packet = reassembler.receive_from(&mut source).unwrap();
        assert!(packet.is_drained());
    }

    #[test]
    fn partial_frame_carries_over_unavailable() {
        let bytes = wire(&[b"carry-over"]);
        for split in 1..bytes.len() {
            let mut source = ScriptedSource::new(vec![
                Step::Data(bytes[..split].to_vec()),
                Step::WouldBlock,
                Step::Data(bytes[split..].to_vec()),
            ]);
            let mut reassembler = FrameReassembler::new();

            let err = reassembler.receive_from(&mut source).unwrap_err();
            assert!(err.is_unavailable());
            assert_eq!(reassembler.residual_len(), split);

            let packet = reassembler.receive_from(&mut source).unwrap();
            assert_eq!(packet.payload(), b"carry-over");
            assert_eq!(reassembler.residual_len(), 0);
        }
    }

    #[test]
    fn unavailable_without_data_leaves_residual_untouched() {
        let mut source = ScriptedSource::new(vec![Step::Data(vec![0x00]), Step::WouldBlock]);
        let mut reassembler = FrameReassembler::new();

        assert!(reassembler.receive_from(&mut source).unwrap_err().is_unavailable());
        assert_eq!(reassembler.residual_len(), 1);

        let mut idle = ScriptedSource::new(vec![Step::WouldBlock]);
        assert!(reassembler.receive_from(&mut idle).unwrap_err().is_unavailable());
        assert_eq!(reassembler.residual_len(), 1);
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[b"ok"]);
        let mut source = ScriptedSource::new(vec![Step::Interrupted, Step::Data(bytes)]);
        let mut reassembler = FrameReassembler::new();

        let packet = reassembler.receive_from(&mut source).unwrap();
        assert_eq!(packet.payload(), b"ok");
    }

    #[test]
    fn hard_error_propagates_and_keeps_residual() {
        let mut source = ScriptedSource::new(vec![Step::Data(vec![0x00, 0x05, b'a']), Step::Fail]);
        let mut reassembler = FrameReassembler::new();

        let err = reassembler.receive_from(&mut source).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
        assert_eq!(reassembler.residual_len(), 3);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reassembler = FrameReassembler::new();
        let err = reassembler
            .receive_from(&mut Cursor::new(Vec::<u8>::new()))
            .unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut bytes = wire(&[b"only-part-of-it"]);
        bytes.truncate(6);

        let mut reassembler = FrameReassembler::new();
        let err = reassembler
            .receive_from(&mut Cursor::new(bytes))
            .unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(reassembler.residual_len(), 6);
    }

    #[test]
    fn oversized_declared_length_in_stream() {
        let mut reassembler = FrameReassembler::with_config(FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        });
        let err = reassembler
            .receive_from(&mut Cursor::new(vec![0x04, 0x00]))
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 1024, max: 16 }));
    }

    #[test]
    fn datagram_receive_drops_stale_partial_frame() {
        let mut datagrams = vec![
            vec![0x00, 0x08, b's', b't'],
            wire(&[b"fresh"]),
        ]
        .into_iter();
        let mut reassembler = FrameReassembler::new();

        let packet = reassembler
            .receive_datagram_with(|buf| {
                let datagram = datagrams.next().expect("only two datagrams are read");
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(datagram.len())
            })
            .unwrap();
        assert_eq!(packet.payload(), b"fresh");
        assert_eq!(reassembler.residual_len(), 0);
    }

    #[test]
    fn datagram_receive_keeps_complete_frames_from_one_read() {
        let mut reassembler = FrameReassembler::new();
        let mut reads = 0;
        let mut read_once = |buf: &mut [u8]| {
            reads += 1;
            let datagram = wire(&[b"one", b"two"]);
            buf[..datagram.len()].copy_from_slice(&datagram);
            Ok::<_, std::io::Error>(datagram.len())
        };

        let first = reassembler.receive_datagram_with(&mut read_once).unwrap();
        assert_eq!(first.payload(), b"one");
        let second = reassembler
            .receive_datagram_with(|_| panic!("second frame is already buffered"))
            .unwrap();
        assert_eq!(second.payload(), b"two");
        assert_eq!(reads, 1);
    }

    #[cfg(unix)]
    #[test]
    fn roundtrip_over_unix_stream() {
        use std::io::Write;

        let (mut left, mut right) = std::os::unix::net::UnixStream::pair().unwrap();
        left.write_all(&wire(&[b"ping", b"pong"])).unwrap();

        let mut reassembler = FrameReassembler::new();
        assert_eq!(reassembler.receive_from(&mut right).unwrap().payload(), b"ping");
        assert_eq!(reassembler.receive_from(&mut right).unwrap().payload(), b"pong");
    }

    enum Step {
        Data(Vec<u8>),
        WouldBlock,
        Interrupted,
        Fail,
    }

    /// Replays a script of reads; an exhausted script reads as EOF.
    struct ScriptedSource {
        steps: VecDeque<Step>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }

        fn chunked(bytes: &[u8], chunk: usize) -> Self {
            Self::new(
                bytes
                    .chunks(chunk)
                    .map(|c| Step::Data(c.to_vec()))
                    .collect(),
            )
        }
    }

    impl Read for ScriptedSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Step::WouldBlock) => Err(std::io::Error::from(ErrorKind::WouldBlock)),
                Some(Step::Interrupted) => Err(std::io::Error::from(ErrorKind::Interrupted)),
                Some(Step::Fail) => Err(std::io::Error::from(ErrorKind::ConnectionReset)),
                Some(Step::Data(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.steps.push_front(Step::Data(bytes[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }
}
