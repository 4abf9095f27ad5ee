use std::net::SocketAddr;

/// Errors that can occur in socket transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The OS refused to allocate a socket handle.
    #[error("failed to create socket: {0}")]
    Create(std::io::Error),

    /// Failed to bind to the wildcard address on the given port.
    #[error("failed to bind to port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to put the socket into the listening state.
    #[error("failed to listen: {0}")]
    Listen(std::io::Error),

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Releasing the OS handle failed. The handle is closed regardless.
    #[error("failed to close socket: {0}")]
    Close(std::io::Error),

    /// The destination could not be resolved to an IPv4 address.
    #[error("invalid address {0}")]
    InvalidAddress(String),

    /// `open` was called on a socket that already holds a handle.
    #[error("socket is already open")]
    AlreadyOpen,

    /// The operation needs an open handle.
    #[error("socket is closed")]
    Closed,

    /// Non-blocking operation could not complete right now; retry later.
    #[error("operation would block")]
    Unavailable,

    /// An I/O error occurred on the socket.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True for the transient "retry later" condition.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TransportError::Unavailable)
    }

    /// Lower into a plain I/O error for `Read`-based consumers.
    ///
    /// `Unavailable` becomes `ErrorKind::WouldBlock` and `Closed` becomes
    /// `ErrorKind::NotConnected`.
    pub fn into_io(self) -> std::io::Error {
        match self {
            TransportError::Unavailable => std::io::Error::from(std::io::ErrorKind::WouldBlock),
            TransportError::Closed => std::io::Error::from(std::io::ErrorKind::NotConnected),
            TransportError::Io(io) => io,
            other => std::io::Error::other(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
