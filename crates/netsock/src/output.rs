use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use netsock_frame::DataPacket;
use serde::Serialize;

use crate::cmd::field::FieldValue;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    transport: &'a str,
    peer: Option<String>,
    payload_size: usize,
    payload_hex: String,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldValue]>,
    timestamp: String,
}

/// A received frame plus what the command knows about where it came from.
pub struct ReceivedFrame<'a> {
    pub transport: &'a str,
    pub peer: Option<SocketAddr>,
    pub packet: &'a DataPacket,
    pub fields: &'a [FieldValue],
}

pub fn print_frame(frame: &ReceivedFrame<'_>, format: OutputFormat) {
    let payload = frame.packet.payload();
    let peer = frame.peer.map(|addr| addr.to_string());

    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                transport: frame.transport,
                peer,
                payload_size: payload.len(),
                payload_hex: hex(payload),
                payload: payload_preview(payload),
                fields: (!frame.fields.is_empty()).then_some(frame.fields),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TRANSPORT", "PEER", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    frame.transport.to_string(),
                    peer.unwrap_or_else(|| "-".to_string()),
                    payload.len().to_string(),
                    describe_payload(payload, frame.fields),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "transport={} peer={} size={} payload={}",
                frame.transport,
                peer.unwrap_or_else(|| "-".to_string()),
                payload.len(),
                describe_payload(payload, frame.fields)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn describe_payload(payload: &[u8], fields: &[FieldValue]) -> String {
    if fields.is_empty() {
        return format!("{} [{}]", payload_preview(payload), hex(payload));
    }
    fields
        .iter()
        .map(format_field)
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_field(field: &FieldValue) -> String {
    match field {
        FieldValue::I8(v) => format!("i8:{v}"),
        FieldValue::I16(v) => format!("i16:{v}"),
        FieldValue::I32(v) => format!("i32:{v}"),
        FieldValue::I64(v) => format!("i64:{v}"),
        FieldValue::U8(v) => format!("u8:{v}"),
        FieldValue::U16(v) => format!("u16:{v}"),
        FieldValue::U32(v) => format!("u32:{v}"),
        FieldValue::U64(v) => format!("u64:{v}"),
        FieldValue::Text(v) => format!("text:{v:?}"),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn hex(payload: &[u8]) -> String {
    payload.iter().fold(
        String::with_capacity(payload.len() * 2),
        |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        },
    )
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
