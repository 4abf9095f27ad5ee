//! Framed TCP and UDP packets with a typed, queue-based serializer.
//!
//! netsock sends discrete messages over IPv4 sockets. A message is a
//! [`DataPacket`](frame::DataPacket): a FIFO queue of big-endian integers and
//! NUL-terminated text. On the wire every packet travels as one frame with a
//! 2-byte length prefix, so receivers always get whole packets even when TCP
//! fragments or coalesces the byte stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: owned socket handles, blocking modes, address resolution
//! - [`frame`]: typed packets, the length-prefix codec, stream reassembly
//! - [`endpoint`]: TCP client, TCP listener and UDP endpoint (behind the
//!   `endpoint` feature, on by default)

/// Re-export transport types.
pub mod transport {
    pub use netsock_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use netsock_frame::*;
}

/// Re-export endpoint types (requires `endpoint` feature).
#[cfg(feature = "endpoint")]
pub mod endpoint {
    pub use netsock_endpoint::*;
}
