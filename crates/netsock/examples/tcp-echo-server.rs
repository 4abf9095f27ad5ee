//! Minimal TCP echo server: accepts one client and echoes packets back.
//!
//! Run with:
//!   cargo run --example tcp-echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1 4000 \
//!     --field u32:42 --field text:hello --wait --decode u32,text

use netsock::endpoint::{TcpClient, TcpListener};
use netsock::frame::FrameError;
use netsock::transport::Mode;

const PORT: u16 = 4000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut listener = TcpListener::new(Mode::Blocking);
    listener.begin_listening(PORT)?;
    eprintln!("Listening on {}", listener.local_addr()?);

    let mut client = TcpClient::new(Mode::Blocking);
    listener.accept_new_client(&mut client)?;
    eprintln!("Client connected: {}", client.peer_addr()?);

    loop {
        match client.receive() {
            Ok(mut packet) => {
                eprintln!("Received {} bytes", packet.len());
                client.send(&mut packet)?;
            }
            Err(netsock::endpoint::EndpointError::Frame(FrameError::ConnectionClosed)) => {
                eprintln!("Client disconnected");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    listener.end_listening()?;
    Ok(())
}
