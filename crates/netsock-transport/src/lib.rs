//! Owned IPv4 socket handles for TCP and UDP.
//!
//! This is the lowest layer of netsock. A [`RawSocket`] owns at most one OS
//! handle and a blocking [`Mode`] fixed at construction. Every transfer reports
//! one of three outcomes:
//! - success with a byte count
//! - [`TransportError::Unavailable`] in non-blocking mode (retry later)
//! - any other [`TransportError`] (hard failure)
//!
//! Framing and typed packets live in `netsock-frame`, built on top of this.

pub mod addr;
pub mod config;
pub mod error;
pub mod socket;

pub use addr::resolve_ipv4;
pub use config::{Mode, SocketConfig, SocketKind};
pub use error::{Result, TransportError};
pub use socket::{RawSocket, MAX_BACKLOG};
