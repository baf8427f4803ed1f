//! MONITOR command wire layout.
//!
//! Subcmd bit layout: `0x08` = INIT (client) / init reply carries prototype
//! (server), `0x10` = final, `0x80` = pipeline (on INIT) or ACK (client to
//! server only), `0x44`/`0x04` = START/STOP.

use crate::error::WireError;
use crate::wire::buffer::{InBuf, OutBuf};
use crate::wire::codec::{self, Status};
use crate::wire::value::{BitMask, TypeDesc, Value};

pub const SUBCMD_INIT: u8 = 0x08;
pub const SUBCMD_FINAL: u8 = 0x10;
pub const SUBCMD_PIPELINE_OR_ACK: u8 = 0x80;
pub const SUBCMD_START: u8 = 0x44;
pub const SUBCMD_STOP: u8 = 0x04;

/// Client -> server INIT.
pub fn encode_init(
    out: &mut dyn OutBuf,
    sid: u32,
    ioid: u32,
    pipeline: bool,
    desc: &TypeDesc,
    value: &Value,
    queue_size: u32,
) -> Result<(), WireError> {
    let subcmd = SUBCMD_INIT | if pipeline { SUBCMD_PIPELINE_OR_ACK } else { 0 };
    codec::write_u32(out, sid)?;
    codec::write_u32(out, ioid)?;
    codec::write_u8(out, subcmd)?;
    desc.encode(out)?;
    value.encode_full(out)?;
    if pipeline {
        codec::write_u32(out, queue_size)?;
    }
    Ok(())
}

/// Client -> server START (`paused = false`) or STOP (`paused = true`).
pub fn encode_start_stop(out: &mut dyn OutBuf, sid: u32, ioid: u32, paused: bool) -> Result<(), WireError> {
    let subcmd = if paused { SUBCMD_STOP } else { SUBCMD_START };
    codec::write_u32(out, sid)?;
    codec::write_u32(out, ioid)?;
    codec::write_u8(out, subcmd)?;
    Ok(())
}

/// Client -> server ACK (pipeline only).
pub fn encode_ack(out: &mut dyn OutBuf, sid: u32, ioid: u32, unack: u32) -> Result<(), WireError> {
    codec::write_u32(out, sid)?;
    codec::write_u32(out, ioid)?;
    codec::write_u8(out, SUBCMD_PIPELINE_OR_ACK)?;
    codec::write_u32(out, unack)?;
    Ok(())
}

/// A decoded server -> client MONITOR frame, before it has been matched
/// against an `ioid` or validated against FSM state.
#[derive(Debug)]
pub struct InboundFrame {
    pub ioid: u32,
    pub init: bool,
    pub final_bit: bool,
    pub status: Option<Status>,
    /// Present iff `init`.
    pub prototype: Option<TypeDesc>,
}

/// Decode the frame header and, if present, the status/prototype tail.
/// Does not decode the compact update payload — that requires the cached
/// prototype for this `ioid`, which the caller resolves after the lookup.
pub fn decode_header(inp: &mut dyn InBuf) -> Result<InboundFrame, WireError> {
    let ioid = codec::read_u32(inp)?;
    let subcmd = codec::read_u8(inp)?;
    let init = subcmd & SUBCMD_INIT != 0;
    let final_bit = subcmd & SUBCMD_FINAL != 0;

    let status = if init || final_bit { Some(Status::decode(inp)?) } else { None };
    let prototype = if init { Some(TypeDesc::decode(inp)?) } else { None };

    Ok(InboundFrame { ioid, init, final_bit, status, prototype })
}

/// Decode a data frame's value payload (valid-fields bitmask + field data)
/// plus the trailing overrun bitmask, which is decoded and discarded —
/// overrun tracking itself has no consumer at this layer.
pub fn decode_update_value(inp: &mut dyn InBuf, prototype: &TypeDesc) -> Result<Value, WireError> {
    let mut value = Value::clone_empty(prototype);
    value.decode_valid(inp)?;
    let _overrun = BitMask::decode(inp)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::buffer::{VecInBuf, VecOutBuf};

    #[test]
    fn init_roundtrip_pipeline() {
        let desc = TypeDesc::new(1, b"schema".to_vec());
        let value = Value { type_id: 1, fields: vec![9, 9], valid: BitMask::default() };
        let mut out = VecOutBuf::new(true);
        encode_init(&mut out, 42, 7, true, &desc, &value, 8).unwrap();

        let mut inp = VecInBuf::new(true, out.into_inner());
        assert_eq!(codec::read_u32(&mut inp).unwrap(), 42);
        assert_eq!(codec::read_u32(&mut inp).unwrap(), 7);
        let subcmd = codec::read_u8(&mut inp).unwrap();
        assert_eq!(subcmd, SUBCMD_INIT | SUBCMD_PIPELINE_OR_ACK);
        assert_eq!(TypeDesc::decode(&mut inp).unwrap(), desc);
        assert_eq!(codec::read_u32(&mut inp).unwrap(), 1); // value.type_id
        assert_eq!(codec::read_bytes(&mut inp).unwrap(), vec![9, 9]);
        assert_eq!(codec::read_u32(&mut inp).unwrap(), 8); // queue_size
        assert_eq!(inp.remaining(), 0);
    }

    #[test]
    fn start_stop_subcmds() {
        let mut out = VecOutBuf::new(true);
        encode_start_stop(&mut out, 1, 2, false).unwrap();
        let mut inp = VecInBuf::new(true, out.into_inner());
        let _sid = codec::read_u32(&mut inp).unwrap();
        let _ioid = codec::read_u32(&mut inp).unwrap();
        assert_eq!(codec::read_u8(&mut inp).unwrap(), SUBCMD_START);

        let mut out = VecOutBuf::new(true);
        encode_start_stop(&mut out, 1, 2, true).unwrap();
        let mut inp = VecInBuf::new(true, out.into_inner());
        codec::read_u32(&mut inp).unwrap();
        codec::read_u32(&mut inp).unwrap();
        assert_eq!(codec::read_u8(&mut inp).unwrap(), SUBCMD_STOP);
    }

    #[test]
    fn decode_header_final_with_status() {
        let mut out = VecOutBuf::new(true);
        codec::write_u32(&mut out, 99).unwrap();
        codec::write_u8(&mut out, SUBCMD_FINAL).unwrap();
        Status::ok().encode(&mut out).unwrap();

        let mut inp = VecInBuf::new(true, out.into_inner());
        let frame = decode_header(&mut inp).unwrap();
        assert_eq!(frame.ioid, 99);
        assert!(!frame.init);
        assert!(frame.final_bit);
        assert_eq!(frame.status, Some(Status::ok()));
        assert!(frame.prototype.is_none());
    }
}
