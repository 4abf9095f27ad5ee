//! Connection-oriented facades over framed sockets.
//!
//! - [`TcpClient`]: connect to a server, or receive an accepted connection,
//!   and exchange [`DataPacket`](netsock_frame::DataPacket)s with one peer.
//! - [`TcpListener`]: bind a local port and hand pending connections to
//!   clients.
//! - [`UdpEndpoint`]: bind a local port and exchange one packet per datagram
//!   with any peer.
//!
//! Each facade guards its own state machine (connected, listening, bound) and
//! releases its handle on drop.
//!
//! # Example
//!
//! ```no_run
//! use netsock_endpoint::{TcpClient, TcpListener};
//! use netsock_frame::DataPacket;
//! use netsock_transport::Mode;
//!
//! let mut listener = TcpListener::new(Mode::Blocking);
//! listener.begin_listening(4000)?;
//!
//! let mut peer = TcpClient::new(Mode::Blocking);
//! listener.accept_new_client(&mut peer)?;
//!
//! let mut packet = peer.receive()?;
//! let greeting: String = packet.read()?;
//!
//! let mut reply = DataPacket::new();
//! reply.write(greeting.len() as u32)?;
//! peer.send(&mut reply)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod error;
pub mod listener;
pub mod udp;

pub use client::TcpClient;
pub use error::{EndpointError, Result};
pub use listener::TcpListener;
pub use udp::UdpEndpoint;
