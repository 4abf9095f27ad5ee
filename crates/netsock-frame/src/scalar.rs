//! Scalar codec: fixed-width integers and NUL-terminated text.
//!
//! Integers are written big-endian regardless of host byte order. Text is its
//! UTF-8 bytes followed by a single `0x00`, with no length prefix.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Terminator appended after every encoded text value.
pub const TEXT_TERMINATOR: u8 = 0x00;

/// A value that can be appended to a packet.
pub trait Encode {
    fn encode(&self, dst: &mut BytesMut) -> Result<()>;
}

/// A value that can be consumed from the head of a packet.
///
/// Implementations consume nothing when they fail.
pub trait Decode: Sized {
    fn decode(src: &mut BytesMut) -> Result<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, dst: &mut BytesMut) -> Result<()> {
                    dst.$put(*self);
                    Ok(())
                }
            }

            impl Decode for $ty {
                fn decode(src: &mut BytesMut) -> Result<Self> {
                    ensure_available(src, std::mem::size_of::<$ty>())?;
                    Ok(src.$get())
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16, get_u16;
    i16 => put_i16, get_i16;
    u32 => put_u32, get_u32;
    i32 => put_i32, get_i32;
    u64 => put_u64, get_u64;
    i64 => put_i64, get_i64;
}

impl Encode for str {
    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let bytes = self.as_bytes();
        if bytes.contains(&TEXT_TERMINATOR) {
            return Err(FrameError::InteriorNul);
        }
        dst.reserve(bytes.len() + 1);
        dst.put_slice(bytes);
        dst.put_u8(TEXT_TERMINATOR);
        Ok(())
    }
}

impl Encode for String {
    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        self.as_str().encode(dst)
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        (**self).encode(dst)
    }
}

impl Decode for String {
    fn decode(src: &mut BytesMut) -> Result<Self> {
        let end = src
            .iter()
            .position(|&b| b == TEXT_TERMINATOR)
            .ok_or(FrameError::InsufficientData {
                needed: src.len() + 1,
                available: src.len(),
            })?;

        let text = String::from_utf8(src[..end].to_vec())?;
        src.advance(end + 1);
        Ok(text)
    }
}

fn ensure_available(src: &BytesMut, needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(FrameError::InsufficientData {
            needed,
            available: src.len(),
        });
    }
    Ok(())
}
