//! Typed packet buffers and length-prefixed framing for netsock.
//!
//! Every frame on the wire is:
//! - A 2-byte big-endian payload length
//! - The payload bytes
//!
//! A payload is built and consumed through [`DataPacket`], a FIFO queue of
//! big-endian integers and NUL-terminated text. [`FramedSocket`] sends a
//! packet as one frame and reassembles incoming bytes so that every
//! successful receive yields exactly one complete packet.

pub mod codec;
pub mod error;
pub mod packet;
pub mod reassembler;
pub mod scalar;
pub mod socket;

pub use codec::{
    decode_frame, encode_frame, FrameConfig, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use packet::DataPacket;
pub use reassembler::FrameReassembler;
pub use scalar::{Decode, Encode, TEXT_TERMINATOR};
pub use socket::FramedSocket;
