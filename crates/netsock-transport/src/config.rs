use std::time::Duration;

/// Whether socket operations suspend the caller or report `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Send, receive and accept block until the OS completes them.
    #[default]
    Blocking,
    /// Operations that cannot complete immediately return `Unavailable`.
    NonBlocking,
}

impl Mode {
    pub fn is_nonblocking(self) -> bool {
        self == Mode::NonBlocking
    }
}

/// Protocol family of a socket handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Tcp,
    Udp,
}

impl SocketKind {
    /// Whether the transport is a byte stream (no inherent message boundaries).
    pub fn is_stream(self) -> bool {
        self == SocketKind::Tcp
    }

    pub fn name(self) -> &'static str {
        match self {
            SocketKind::Tcp => "tcp",
            SocketKind::Udp => "udp",
        }
    }
}

/// Configuration applied to every handle a [`RawSocket`](crate::RawSocket) opens.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Blocking mode, fixed for the lifetime of the socket.
    pub mode: Mode,
    /// OS-level receive timeout (blocking mode). Expiry surfaces as `Unavailable`.
    pub read_timeout: Option<Duration>,
    /// OS-level send timeout (blocking mode). Expiry surfaces as `Unavailable`.
    pub write_timeout: Option<Duration>,
    /// Set `SO_REUSEADDR` before binding.
    pub reuse_address: bool,
}

impl SocketConfig {
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Blocking,
            read_timeout: None,
            write_timeout: None,
            reuse_address: true,
        }
    }
}
