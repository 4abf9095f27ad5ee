use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Length prefix width: one big-endian `u16`.
pub const HEADER_SIZE: usize = 2;

/// Largest payload the 16-bit length prefix can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Largest complete frame on the wire.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────────┐
/// │ Length       │ Payload         │
/// │ (2B BE)      │ (Length bytes)  │
/// └──────────────┴─────────────────┘
/// ```
///
/// Payloads longer than [`MAX_PAYLOAD`] are rejected instead of having their
/// length silently truncated.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: MAX_PAYLOAD,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u16(len);
    dst.put_slice(payload);
    Ok(())
}

/// Peek the declared payload length without consuming anything.
pub fn declared_length(src: &[u8]) -> Option<usize> {
    let prefix: [u8; HEADER_SIZE] = src.get(..HEADER_SIZE)?.try_into().ok()?;
    Some(u16::from_be_bytes(prefix) as usize)
}

/// Decode one frame from the head of `src`.
///
/// Returns `Ok(None)` while the buffer doesn't hold a complete frame yet, in
/// which case nothing is consumed. On success the prefix and payload are
/// removed from `src` and the payload is returned.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<BytesMut>> {
    let Some(payload_len) = declared_length(src) else {
        return Ok(None); // Need more data
    };

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() - HEADER_SIZE < payload_len {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len)))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes, at most [`MAX_PAYLOAD`]. Default: 65535.
    pub max_payload_size: usize,
    /// On datagram sockets, drop leftover bytes that do not form a complete
    /// frame before reading the next datagram, so one truncated or stray
    /// datagram cannot shift the framing of the ones after it. Default: off,
    /// which lets a frame span datagrams.
    pub discard_partial_datagrams: bool,
}

impl FrameConfig {
    /// Effective limit, clamped to what the length prefix can express.
    pub fn payload_limit(&self) -> usize {
        self.max_payload_size.min(MAX_PAYLOAD)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            discard_partial_datagrams: false,
        }
    }
}
