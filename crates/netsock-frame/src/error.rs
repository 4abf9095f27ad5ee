use netsock_transport::TransportError;

/// Errors that can occur while encoding, decoding or transferring frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A read asked for more bytes than the packet still holds.
    #[error("insufficient data ({needed} bytes needed, {available} available)")]
    InsufficientData { needed: usize, available: usize },

    /// Text with an embedded NUL cannot be encoded as NUL-terminated text.
    #[error("text contains an interior NUL byte")]
    InteriorNul,

    /// Decoded text bytes are not valid UTF-8.
    #[error("text is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),

    /// The payload does not fit the 16-bit length prefix (or the configured max).
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream ended before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// Non-blocking transfer could not make progress; retry later.
    #[error("frame transfer would block")]
    Unavailable,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying socket reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// True for the transient "retry later" condition, wherever it originated.
    pub fn is_unavailable(&self) -> bool {
        match self {
            FrameError::Unavailable => true,
            FrameError::Transport(err) => err.is_unavailable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
