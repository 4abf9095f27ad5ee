use bytes::BytesMut;

use crate::error::Result;
use crate::scalar::{Decode, Encode};

/// A FIFO byte queue holding one frame's payload.
///
/// Values are appended at the tail with [`write`](Self::write) and consumed
/// from the head with [`read`](Self::read) / [`read_into`](Self::read_into),
/// in the same order they were written:
///
/// ```
/// use netsock_frame::DataPacket;
///
/// let mut packet = DataPacket::new();
/// packet.write(42u32)?.write("hi")?;
///
/// let mut id = 0u32;
/// let mut name = String::new();
/// packet.read_into(&mut id)?.read_into(&mut name)?;
/// assert_eq!((id, name.as_str()), (42, "hi"));
/// assert!(packet.is_drained());
/// # Ok::<(), netsock_frame::FrameError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataPacket {
    data: BytesMut,
}

impl DataPacket {
    pub fn new() -> Self {
        Self::default()
    }

    /// A packet whose unread bytes are exactly `payload`.
    pub fn from_payload(payload: &[u8]) -> Self {
        Self {
            data: BytesMut::from(payload),
        }
    }

    pub(crate) fn from_bytes(data: BytesMut) -> Self {
        Self { data }
    }

    /// Append one value.
    pub fn write<T: Encode>(&mut self, value: T) -> Result<&mut Self> {
        value.encode(&mut self.data)?;
        Ok(self)
    }

    /// Append raw bytes with no terminator or prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Consume one value from the head.
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        T::decode(&mut self.data)
    }

    /// Consume one value from the head into `out`, for chained extraction.
    ///
    /// On error `out` is left unchanged and nothing is consumed.
    pub fn read_into<T: Decode>(&mut self, out: &mut T) -> Result<&mut Self> {
        *out = T::decode(&mut self.data)?;
        Ok(self)
    }

    /// True when every written byte has been read (or sent).
    pub fn is_drained(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The unread bytes, without consuming them.
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Discard every unread byte.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
