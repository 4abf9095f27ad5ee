use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use netsock_endpoint::{EndpointError, TcpClient, TcpListener, UdpEndpoint};
use netsock_frame::{FrameConfig, FrameError};
use netsock_transport::Mode;
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, polling_config, EchoArgs};
use crate::exit::{endpoint_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

enum RecvErrorDisposition {
    Retry,
    Break,
    Fatal(CliError),
}

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if args.udp {
        echo_udp(args.port, &running)
    } else {
        echo_tcp(args.port, &running)
    }
}

fn echo_tcp(port: u16, running: &AtomicBool) -> CliResult<i32> {
    let mut listener = TcpListener::with_config(polling_config());
    listener
        .begin_listening(port)
        .map_err(|err| endpoint_error("listen failed", err))?;

    while running.load(Ordering::SeqCst) {
        let mut client = TcpClient::new(Mode::Blocking);
        match listener.accept_new_client(&mut client) {
            Ok(()) => {}
            Err(err) if err.is_unavailable() => continue,
            Err(err) => return Err(endpoint_error("accept failed", err)),
        }
        let peer = client.peer_addr().ok();
        debug!(?peer, "client connected");

        while running.load(Ordering::SeqCst) {
            let mut packet = match client.receive() {
                Ok(packet) => packet,
                Err(err) => match classify_recv_error(err) {
                    RecvErrorDisposition::Retry => continue,
                    RecvErrorDisposition::Break => break,
                    RecvErrorDisposition::Fatal(cli_err) => return Err(cli_err),
                },
            };

            info!(?peer, size = packet.len(), "echoing frame");
            client
                .send(&mut packet)
                .map_err(|err| endpoint_error("echo send failed", err))?;
        }
    }

    Ok(SUCCESS)
}

fn echo_udp(port: u16, running: &AtomicBool) -> CliResult<i32> {
    let mut endpoint = UdpEndpoint::with_config(polling_config(), FrameConfig::default());
    endpoint
        .bind(port)
        .map_err(|err| endpoint_error("bind failed", err))?;

    let mut last_source: Option<SocketAddr> = None;
    while running.load(Ordering::SeqCst) {
        let (mut packet, source) = match endpoint.receive_from() {
            Ok(received) => received,
            Err(err) => match classify_recv_error(err) {
                RecvErrorDisposition::Retry | RecvErrorDisposition::Break => continue,
                RecvErrorDisposition::Fatal(cli_err) => return Err(cli_err),
            },
        };

        // A frame assembled only from buffered bytes came from the last sender.
        let Some(destination) = source.or(last_source) else {
            warn!(size = packet.len(), "dropping frame with unknown sender");
            continue;
        };
        last_source = Some(destination);

        info!(peer = %destination, size = packet.len(), "echoing frame");
        endpoint
            .send_to_addr(&mut packet, destination)
            .map_err(|err| endpoint_error("echo send failed", err))?;
    }

    Ok(SUCCESS)
}

fn classify_recv_error(err: EndpointError) -> RecvErrorDisposition {
    if err.is_unavailable() {
        return RecvErrorDisposition::Retry;
    }
    if matches!(err, EndpointError::Frame(FrameError::ConnectionClosed)) {
        return RecvErrorDisposition::Break;
    }
    RecvErrorDisposition::Fatal(endpoint_error("receive failed", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsock_transport::TransportError;

    #[test]
    fn closed_connection_breaks_loop() {
        let disposition =
            classify_recv_error(EndpointError::Frame(FrameError::ConnectionClosed));
        assert!(matches!(disposition, RecvErrorDisposition::Break));
    }

    #[test]
    fn unavailable_retries() {
        let disposition = classify_recv_error(EndpointError::Frame(FrameError::Transport(
            TransportError::Unavailable,
        )));
        assert!(matches!(disposition, RecvErrorDisposition::Retry));
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let disposition = classify_recv_error(EndpointError::Frame(FrameError::PayloadTooLarge {
            size: 70_000,
            max: 65_535,
        }));
        assert!(matches!(disposition, RecvErrorDisposition::Fatal(_)));
    }
}
