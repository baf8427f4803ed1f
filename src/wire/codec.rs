//! Fixed-width integer, length-prefixed string/bytes, and status encoders
//! and decoders over the [`OutBuf`]/[`InBuf`] traits.

use crate::error::WireError;
use crate::wire::buffer::{InBuf, OutBuf};

/// Sanity cap on any length prefix this crate will decode. Guards against
/// a corrupt or hostile length field causing an enormous allocation.
const MAX_LEN: u32 = 64 * 1024 * 1024;

pub fn write_u8(out: &mut dyn OutBuf, v: u8) -> Result<(), WireError> {
    out.write_bytes(&[v]);
    if out.fault() { Err(WireError::AllocFailed) } else { Ok(()) }
}

pub fn write_u16(out: &mut dyn OutBuf, v: u16) -> Result<(), WireError> {
    let bytes = if out.big_endian() { v.to_be_bytes() } else { v.to_le_bytes() };
    out.write_bytes(&bytes);
    if out.fault() { Err(WireError::AllocFailed) } else { Ok(()) }
}

pub fn write_u32(out: &mut dyn OutBuf, v: u32) -> Result<(), WireError> {
    let bytes = if out.big_endian() { v.to_be_bytes() } else { v.to_le_bytes() };
    out.write_bytes(&bytes);
    if out.fault() { Err(WireError::AllocFailed) } else { Ok(()) }
}

pub fn write_u64(out: &mut dyn OutBuf, v: u64) -> Result<(), WireError> {
    let bytes = if out.big_endian() { v.to_be_bytes() } else { v.to_le_bytes() };
    out.write_bytes(&bytes);
    if out.fault() { Err(WireError::AllocFailed) } else { Ok(()) }
}

pub fn write_bytes(out: &mut dyn OutBuf, v: &[u8]) -> Result<(), WireError> {
    write_u32(out, v.len() as u32)?;
    out.write_bytes(v);
    if out.fault() { Err(WireError::AllocFailed) } else { Ok(()) }
}

pub fn write_str(out: &mut dyn OutBuf, v: &str) -> Result<(), WireError> {
    write_bytes(out, v.as_bytes())
}

pub fn read_u8(inp: &mut dyn InBuf) -> Result<u8, WireError> {
    let b = inp.read_bytes(1).ok_or(WireError::Truncated)?;
    Ok(b[0])
}

pub fn read_u16(inp: &mut dyn InBuf) -> Result<u16, WireError> {
    let be = inp.big_endian();
    let b = inp.read_bytes(2).ok_or(WireError::Truncated)?;
    let arr: [u8; 2] = b.try_into().unwrap();
    Ok(if be { u16::from_be_bytes(arr) } else { u16::from_le_bytes(arr) })
}

pub fn read_u32(inp: &mut dyn InBuf) -> Result<u32, WireError> {
    let be = inp.big_endian();
    let b = inp.read_bytes(4).ok_or(WireError::Truncated)?;
    let arr: [u8; 4] = b.try_into().unwrap();
    Ok(if be { u32::from_be_bytes(arr) } else { u32::from_le_bytes(arr) })
}

pub fn read_u64(inp: &mut dyn InBuf) -> Result<u64, WireError> {
    let be = inp.big_endian();
    let b = inp.read_bytes(8).ok_or(WireError::Truncated)?;
    let arr: [u8; 8] = b.try_into().unwrap();
    Ok(if be { u64::from_be_bytes(arr) } else { u64::from_le_bytes(arr) })
}

pub fn read_bytes(inp: &mut dyn InBuf) -> Result<Vec<u8>, WireError> {
    let len = read_u32(inp)?;
    if len > MAX_LEN {
        return Err(WireError::InvalidLength(len));
    }
    let b = inp.read_bytes(len as usize).ok_or(WireError::Truncated)?;
    Ok(b.to_vec())
}

pub fn read_str(inp: &mut dyn InBuf) -> Result<String, WireError> {
    let bytes = read_bytes(inp)?;
    String::from_utf8(bytes).map_err(|_| WireError::InvalidLength(0))
}

/// Protocol status: success flag plus an optional message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub success: bool,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Status { success: true, message: String::new() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Status { success: false, message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn encode(&self, out: &mut dyn OutBuf) -> Result<(), WireError> {
        write_u8(out, u8::from(self.success))?;
        write_str(out, &self.message)
    }

    pub fn decode(inp: &mut dyn InBuf) -> Result<Self, WireError> {
        let success = read_u8(inp)? != 0;
        let message = read_str(inp)?;
        Ok(Status { success, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::buffer::{VecInBuf, VecOutBuf};

    /// Write 0..1024 as 32-bit big-endian; the buffer length is exactly
    /// 4096 bytes; re-reading yields 0..1024 and the buffer is empty.
    #[test]
    fn codec_fill_4096_roundtrip() {
        let mut out = VecOutBuf::new(true);
        for i in 0u32..1024 {
            write_u32(&mut out, i).unwrap();
        }
        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 4096);

        let mut inp = VecInBuf::new(true, bytes);
        for expect in 0u32..1024 {
            assert_eq!(read_u32(&mut inp).unwrap(), expect);
        }
        assert_eq!(inp.remaining(), 0);
        assert!(inp.read_bytes(1).is_none());
    }

    #[test]
    fn roundtrip_mixed_primitives_and_strings() {
        let mut out = VecOutBuf::new(true);
        write_u32(&mut out, 42).unwrap();
        write_str(&mut out, "channel:name").unwrap();
        write_u8(&mut out, 7).unwrap();
        Status::ok().encode(&mut out).unwrap();
        Status::error("bad request").encode(&mut out).unwrap();

        let mut inp = VecInBuf::new(true, out.into_inner());
        assert_eq!(read_u32(&mut inp).unwrap(), 42);
        assert_eq!(read_str(&mut inp).unwrap(), "channel:name");
        assert_eq!(read_u8(&mut inp).unwrap(), 7);
        assert_eq!(Status::decode(&mut inp).unwrap(), Status::ok());
        let err = Status::decode(&mut inp).unwrap();
        assert!(!err.is_success());
        assert_eq!(err.message, "bad request");
        assert_eq!(inp.remaining(), 0);
    }

    #[test]
    fn little_endian_roundtrip() {
        let mut out = VecOutBuf::new(false);
        write_u32(&mut out, 0xdead_beef).unwrap();
        let mut inp = VecInBuf::new(false, out.into_inner());
        assert_eq!(read_u32(&mut inp).unwrap(), 0xdead_beef);
    }
}
