use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use netsock_frame::DataPacket;
use netsock_transport::{SocketConfig, SocketKind};
use tracing::warn;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::{print_frame, OutputFormat, ReceivedFrame};

pub mod echo;
pub mod field;
pub mod listen;
pub mod send;
pub mod version;

use field::{decode_fields, FieldKind, FieldValue};

/// How often blocking server loops wake up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Echo every received frame back to its sender.
    Echo(EchoArgs),
    /// Send a single frame built from typed fields.
    Send(SendArgs),
    /// Listen and print received frames.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Local port to bind.
    pub port: u16,
    /// Use UDP instead of TCP.
    #[arg(long)]
    pub udp: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination host (IPv4 address or name).
    pub host: String,
    /// Destination port.
    pub port: u16,
    /// Use UDP instead of TCP.
    #[arg(long)]
    pub udp: bool,
    /// Packet field, repeatable, written in order (e.g. u32:42, text:hello).
    #[arg(long = "field", short = 'f', value_name = "TYPE:VALUE")]
    pub fields: Vec<FieldValue>,
    /// Wait for one reply frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Field types to decode from the reply (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    pub decode: Vec<FieldKind>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Local port to bind.
    pub port: u16,
    /// Use UDP instead of TCP.
    #[arg(long)]
    pub udp: bool,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Field types to decode from each frame (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    pub decode: Vec<FieldKind>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Socket options for server loops: blocking with a short receive timeout so
/// accept and receive return periodically.
pub(crate) fn polling_config() -> SocketConfig {
    SocketConfig {
        read_timeout: Some(POLL_INTERVAL),
        ..SocketConfig::default()
    }
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Print one received frame, decoding `decode` from it when requested.
///
/// A frame that does not match the requested layout is still printed, without
/// decoded fields.
pub(crate) fn report_frame(
    kind: SocketKind,
    packet: &DataPacket,
    peer: Option<SocketAddr>,
    decode: &[FieldKind],
    format: OutputFormat,
) {
    let fields = decode_fields(packet, decode).unwrap_or_else(|err| {
        warn!(error = %err, ?peer, "frame does not match --decode layout");
        Vec::new()
    });
    print_frame(
        &ReceivedFrame {
            transport: kind.name(),
            peer,
            packet,
            fields: &fields,
        },
        format,
    );
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
