use netsock_frame::FrameError;
use netsock_transport::TransportError;

/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// `connect` on a client that is already connected, or `accept_new_client`
    /// into one.
    #[error("client is already connected")]
    AlreadyConnected,

    /// The client has no connection.
    #[error("client is not connected")]
    NotConnected,

    /// `begin_listening` on a listener that is already listening.
    #[error("listener is already listening")]
    AlreadyListening,

    /// The listener is idle.
    #[error("listener is not listening")]
    NotListening,

    /// `bind` on an endpoint that is already bound.
    #[error("endpoint is already bound")]
    AlreadyBound,

    /// The endpoint is unbound.
    #[error("endpoint is not bound")]
    NotBound,
}

impl EndpointError {
    /// True for the transient non-blocking "retry later" condition.
    pub fn is_unavailable(&self) -> bool {
        match self {
            EndpointError::Transport(err) => err.is_unavailable(),
            EndpointError::Frame(err) => err.is_unavailable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EndpointError>;

/// Shutting down a connection the peer already tore down reports `ENOTCONN`;
/// that is not a failure of the local teardown.
pub(crate) fn is_already_disconnected(err: &TransportError) -> bool {
    matches!(err, TransportError::Io(io) if io.kind() == std::io::ErrorKind::NotConnected)
}
