use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use netsock_endpoint::{EndpointError, TcpClient, TcpListener, UdpEndpoint};
use netsock_frame::{FrameConfig, FrameError};
use netsock_transport::{Mode, SocketKind};
use tracing::debug;

use crate::cmd::{install_ctrlc_handler, polling_config, report_frame, ListenArgs};
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut budget = FrameBudget::new(args.count);
    if budget.exhausted() {
        return Ok(SUCCESS);
    }

    if args.udp {
        listen_udp(&args, format, &running, &mut budget)
    } else {
        listen_tcp(&args, format, &running, &mut budget)
    }
}

fn listen_tcp(
    args: &ListenArgs,
    format: OutputFormat,
    running: &AtomicBool,
    budget: &mut FrameBudget,
) -> CliResult<i32> {
    let mut listener = TcpListener::with_config(polling_config());
    listener
        .begin_listening(args.port)
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
            let packet = match client.receive() {
                Ok(packet) => packet,
                Err(err) if err.is_unavailable() => continue,
                Err(EndpointError::Frame(FrameError::ConnectionClosed)) => {
                    debug!(?peer, "client disconnected");
                    break;
                }
                Err(err) => return Err(endpoint_error("receive failed", err)),
            };

            report_frame(SocketKind::Tcp, &packet, peer, &args.decode, format);
            if budget.record() {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn listen_udp(
    args: &ListenArgs,
    format: OutputFormat,
    running: &AtomicBool,
    budget: &mut FrameBudget,
) -> CliResult<i32> {
    let mut endpoint = UdpEndpoint::with_config(polling_config(), FrameConfig::default());
    endpoint
        .bind(args.port)
        .map_err(|err| endpoint_error("bind failed", err))?;

    while running.load(Ordering::SeqCst) {
        let (packet, peer) = match endpoint.receive_from() {
            Ok(received) => received,
            Err(err) if err.is_unavailable() => continue,
            Err(err) => return Err(endpoint_error("receive failed", err)),
        };

        report_frame(SocketKind::Udp, &packet, peer, &args.decode, format);
        if budget.record() {
            return Ok(SUCCESS);
        }
    }

    Ok(SUCCESS)
}

/// Counts printed frames against the optional `--count` limit.
#[derive(Debug)]
struct FrameBudget {
    limit: Option<usize>,
    seen: usize,
}

impl FrameBudget {
    fn new(limit: Option<usize>) -> Self {
        Self { limit, seen: 0 }
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.seen >= limit)
    }

    /// Record one frame; true once the limit is reached.
    fn record(&mut self) -> bool {
        self.seen = self.seen.saturating_add(1);
        self.exhausted()
    }
}
