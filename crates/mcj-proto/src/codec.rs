//! Protocol encoding/decoding traits and helpers.

use bytes::{Buf, BufMut};

use crate::error::ProtoError;
use crate::types::VarUInt32;

/// Default upper bound for strings when the protocol does not name a tighter one.
pub const MAX_STRING_LEN: usize = 32767;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

/// Binds a packet struct to its wire id.
pub trait Packet {
    const ID: i32;
}

/// Fail with `BufferTooShort` unless `buf` holds at least `needed` bytes.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::BufferTooShort {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Write a length-prefixed byte array (VarUInt32 length + raw bytes).
pub fn write_byte_array(buf: &mut impl BufMut, data: &[u8]) {
    VarUInt32(data.len() as u32).proto_encode(buf);
    buf.put_slice(data);
}

/// Read a length-prefixed byte array of at most `max` bytes.
///
/// The length is checked against `max` before anything is allocated.
pub fn read_byte_array(buf: &mut impl Buf, max: usize) -> Result<Vec<u8>, ProtoError> {
    let len = VarUInt32::proto_decode(buf)?.0 as usize;
    if len > max {
        return Err(ProtoError::ArrayTooLong { len, max });
    }
    ensure_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len).to_vec())
}

/// Write a protocol string (VarUInt32 length + UTF-8), refusing strings longer
/// than `max` bytes.
pub fn write_string(buf: &mut impl BufMut, s: &str, max: usize) -> Result<(), ProtoError> {
    if s.len() > max {
        return Err(ProtoError::StringTooLong { len: s.len(), max });
    }
    write_byte_array(buf, s.as_bytes());
    Ok(())
}

/// Read a protocol string of at most `max` bytes.
pub fn read_string(buf: &mut impl Buf, max: usize) -> Result<String, ProtoError> {
    let len = VarUInt32::proto_decode(buf)?.0 as usize;
    if len > max {
        return Err(ProtoError::StringTooLong { len, max });
    }
    ensure_remaining(buf, len)?;
    let data = buf.copy_to_bytes(len);
    String::from_utf8(data.to_vec()).map_err(|_| ProtoError::InvalidUtf8)
}
