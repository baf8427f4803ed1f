//! Wire codec: length-prefixed primitives, status, and a minimal opaque
//! value system, over growable endian-aware buffers.

pub mod buffer;
pub mod codec;
pub mod monitor_frame;
pub mod value;

pub use buffer::{InBuf, OutBuf, VecInBuf, VecOutBuf, WireBuf};
pub use codec::Status;
pub use value::{BitMask, TypeDesc, Value};
