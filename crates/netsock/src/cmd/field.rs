use std::fmt::Display;
use std::str::FromStr;

use clap::ValueEnum;
use netsock_frame::{DataPacket, FrameError};
use serde::Serialize;

/// Scalar types a packet field can carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FieldKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Text,
}

impl FieldKind {
    /// Consume one field of this kind from the head of `packet`.
    pub fn read(self, packet: &mut DataPacket) -> Result<FieldValue, FrameError> {
        Ok(match self {
            FieldKind::I8 => FieldValue::I8(packet.read()?),
            FieldKind::I16 => FieldValue::I16(packet.read()?),
            FieldKind::I32 => FieldValue::I32(packet.read()?),
            FieldKind::I64 => FieldValue::I64(packet.read()?),
            FieldKind::U8 => FieldValue::U8(packet.read()?),
            FieldKind::U16 => FieldValue::U16(packet.read()?),
            FieldKind::U32 => FieldValue::U32(packet.read()?),
            FieldKind::U64 => FieldValue::U64(packet.read()?),
            FieldKind::Text => FieldValue::Text(packet.read()?),
        })
    }
}

/// One typed packet field, parsed from `TYPE:VALUE` on the command line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Text(String),
}

impl FieldValue {
    pub fn write_to(&self, packet: &mut DataPacket) -> Result<(), FrameError> {
        match self {
            FieldValue::I8(v) => packet.write(*v)?,
            FieldValue::I16(v) => packet.write(*v)?,
            FieldValue::I32(v) => packet.write(*v)?,
            FieldValue::I64(v) => packet.write(*v)?,
            FieldValue::U8(v) => packet.write(*v)?,
            FieldValue::U16(v) => packet.write(*v)?,
            FieldValue::U32(v) => packet.write(*v)?,
            FieldValue::U64(v) => packet.write(*v)?,
            FieldValue::Text(v) => packet.write(v.as_str())?,
        };
        Ok(())
    }
}

impl FromStr for FieldValue {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (kind, value) = input
            .split_once(':')
            .ok_or_else(|| format!("expected TYPE:VALUE, got `{input}`"))?;
        let kind = <FieldKind as ValueEnum>::from_str(kind, true)
            .map_err(|_| format!("unknown field type `{kind}`"))?;

        Ok(match kind {
            FieldKind::I8 => FieldValue::I8(parse_number("i8", value)?),
            FieldKind::I16 => FieldValue::I16(parse_number("i16", value)?),
            FieldKind::I32 => FieldValue::I32(parse_number("i32", value)?),
            FieldKind::I64 => FieldValue::I64(parse_number("i64", value)?),
            FieldKind::U8 => FieldValue::U8(parse_number("u8", value)?),
            FieldKind::U16 => FieldValue::U16(parse_number("u16", value)?),
            FieldKind::U32 => FieldValue::U32(parse_number("u32", value)?),
            FieldKind::U64 => FieldValue::U64(parse_number("u64", value)?),
            FieldKind::Text => FieldValue::Text(value.to_string()),
        })
    }
}

fn parse_number<T>(name: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| format!("invalid {name} `{value}`: {err}"))
}

/// Build a packet from fields, in order.
pub fn build_packet(fields: &[FieldValue]) -> Result<DataPacket, FrameError> {
    let mut packet = DataPacket::new();
    for field in fields {
        field.write_to(&mut packet)?;
    }
    Ok(packet)
}

/// Decode `kinds` from a copy of `packet`, leaving `packet` untouched.
pub fn decode_fields(packet: &DataPacket, kinds: &[FieldKind]) -> Result<Vec<FieldValue>, FrameError> {
    let mut scratch = packet.clone();
    kinds.iter().map(|kind| kind.read(&mut scratch)).collect()
}
