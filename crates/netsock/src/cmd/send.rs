use std::net::SocketAddr;

use netsock_endpoint::{TcpClient, UdpEndpoint};
use netsock_frame::{DataPacket, FrameConfig};
use netsock_transport::{SocketConfig, SocketKind};
use tracing::info;

use crate::cmd::field::build_packet;
use crate::cmd::{parse_duration, report_frame, SendArgs};
use crate::exit::{endpoint_error, frame_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let socket_config = SocketConfig {
        read_timeout: Some(wait_timeout),
        ..SocketConfig::default()
    };

    let mut packet = build_packet(&args.fields).map_err(|err| frame_error("invalid field", err))?;
    let size = packet.len();

    let (kind, reply) = if args.udp {
        (SocketKind::Udp, send_udp(&args, socket_config, &mut packet)?)
    } else {
        (SocketKind::Tcp, send_tcp(&args, socket_config, &mut packet)?)
    };
    info!(host = %args.host, port = args.port, size, "frame sent");

    if let Some((reply, peer)) = reply {
        report_frame(kind, &reply, peer, &args.decode, format);
    }

    Ok(SUCCESS)
}

type Reply = Option<(DataPacket, Option<SocketAddr>)>;

fn send_tcp(args: &SendArgs, config: SocketConfig, packet: &mut DataPacket) -> CliResult<Reply> {
    let mut client = TcpClient::with_config(config, FrameConfig::default());
    client
        .connect(&args.host, args.port)
        .map_err(|err| endpoint_error("connect failed", err))?;
    client
        .send(packet)
        .map_err(|err| endpoint_error("send failed", err))?;

    if !args.wait {
        return Ok(None);
    }
    let reply = client
        .receive()
        .map_err(|err| endpoint_error("receive failed", err))?;
    Ok(Some((reply, client.peer_addr().ok())))
}

fn send_udp(args: &SendArgs, config: SocketConfig, packet: &mut DataPacket) -> CliResult<Reply> {
    let mut endpoint = UdpEndpoint::with_config(config, FrameConfig::default());
    endpoint
        .bind(0)
        .map_err(|err| endpoint_error("bind failed", err))?;
    endpoint
        .send_to(packet, &args.host, args.port)
        .map_err(|err| endpoint_error("send failed", err))?;

    if !args.wait {
        return Ok(None);
    }
    let reply = endpoint
        .receive_from()
        .map_err(|err| endpoint_error("receive failed", err))?;
    Ok(Some(reply))
}
