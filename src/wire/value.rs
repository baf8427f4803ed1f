//! A minimal stand-in for pvAccess's dynamic `Value`/`TypeDesc` system.
//!
//! The real type system (introspection-driven structured values with
//! variant unions, nested structs, and a shared type registry) is out of
//! scope for this crate. This module provides just enough of a
//! "clone/assign/serialise" surface to drive the subscription FSM and dispatch
//! layer in isolation: a type descriptor is an opaque byte blob naming a
//! schema, and a value is a descriptor id plus an opaque payload.

use crate::wire::buffer::{InBuf, OutBuf};
use crate::wire::codec;
use crate::error::WireError;

/// A type descriptor, as would arrive in an INIT reply's prototype.
///
/// Opaque beyond its identity: decoding a later compact update only needs
/// to know which descriptor it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc {
    pub id: u32,
    /// Opaque schema bytes (field names/types in the real system).
    pub schema: Vec<u8>,
}

impl TypeDesc {
    pub fn new(id: u32, schema: impl Into<Vec<u8>>) -> Self {
        TypeDesc { id, schema: schema.into() }
    }

    pub fn encode(&self, out: &mut dyn OutBuf) -> Result<(), WireError> {
        codec::write_u32(out, self.id)?;
        codec::write_bytes(out, &self.schema)
    }

    pub fn decode(inp: &mut dyn InBuf) -> Result<Self, WireError> {
        let id = codec::read_u32(inp)?;
        let schema = codec::read_bytes(inp)?;
        Ok(TypeDesc { id, schema })
    }
}

/// A structured value instance built from some [`TypeDesc`].
///
/// `fields` is an opaque payload (the real system decomposes this into
/// typed fields); `valid` tracks which field slots actually carry data for
/// delta/compact updates, matching the protocol's valid-fields bitmask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub type_id: u32,
    pub fields: Vec<u8>,
    /// Bitmask of which field slots are present; used by squashing to
    /// merge a partial update into a cached full value.
    pub valid: BitMask,
}

impl Value {
    /// A value with no field data, carrying only its type identity — the
    /// "empty clone" the dispatch layer allocates from a cached prototype
    /// before decoding a compact update into it.
    pub fn clone_empty(proto: &TypeDesc) -> Self {
        Value { type_id: proto.id, fields: Vec::new(), valid: BitMask::default() }
    }

    /// Replace this value's contents with `other`'s, preserving identity
    /// (used by squashing to overwrite the queue tail in place rather than
    /// reallocating the queue entry).
    pub fn assign(&mut self, other: &Value) {
        self.type_id = other.type_id;
        self.fields.clear();
        self.fields.extend_from_slice(&other.fields);
        self.valid = other.valid.clone();
    }

    pub fn encode_full(&self, out: &mut dyn OutBuf) -> Result<(), WireError> {
        codec::write_u32(out, self.type_id)?;
        codec::write_bytes(out, &self.fields)
    }

    pub fn decode_valid(&mut self, inp: &mut dyn InBuf) -> Result<(), WireError> {
        self.valid = BitMask::decode(inp)?;
        self.fields = codec::read_bytes(inp)?;
        Ok(())
    }
}

/// A variable-length bitmask, as used for valid-fields and overrun masks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitMask {
    pub bytes: Vec<u8>,
}

impl BitMask {
    pub fn encode(&self, out: &mut dyn OutBuf) -> Result<(), WireError> {
        codec::write_bytes(out, &self.bytes)
    }

    pub fn decode(inp: &mut dyn InBuf) -> Result<Self, WireError> {
        Ok(BitMask { bytes: codec::read_bytes(inp)? })
    }
}
