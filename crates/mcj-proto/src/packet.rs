//! Cursor over one inbound packet's payload.

use std::fmt;

use crate::codec::{read_byte_array, read_string, ProtoDecode};
use crate::error::ProtoError;
use crate::pool::PooledBuffer;
use crate::types::{Uuid, VarInt, VarLong, VarUInt32};

/// An inbound packet: its id plus a read cursor over a leased buffer.
///
/// Every `read_*` advances the cursor and fails with
/// [`ProtoError::BufferTooShort`] instead of reading past the end.
pub struct RawPacket {
    id: i32,
    buf: PooledBuffer,
    pos: usize,
}

impl RawPacket {
    pub fn new(id: i32, buf: PooledBuffer) -> Self {
        Self { id, buf, pos: 0 }
    }

    /// Packet not backed by a pool, mostly for tests.
    pub fn from_slice(id: i32, payload: &[u8]) -> Self {
        Self::new(id, PooledBuffer::detached(payload))
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&[u8], ProtoError> {
        if self.remaining() < n {
            return Err(ProtoError::BufferTooShort {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtoError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Run a `bytes::Buf`-based decoder over the unread part and advance past
    /// whatever it consumed.
    pub fn decode<T: ProtoDecode>(&mut self) -> Result<T, ProtoError> {
        let mut cursor = &self.buf[self.pos..];
        let before = cursor.len();
        let value = T::proto_decode(&mut cursor)?;
        self.pos += before - cursor.len();
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtoError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ProtoError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtoError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtoError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtoError> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtoError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtoError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtoError> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtoError> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    pub fn read_varint(&mut self) -> Result<i32, ProtoError> {
        Ok(self.decode::<VarInt>()?.0)
    }

    pub fn read_uvarint(&mut self) -> Result<u32, ProtoError> {
        Ok(self.decode::<VarUInt32>()?.0)
    }

    pub fn read_varlong(&mut self) -> Result<i64, ProtoError> {
        Ok(self.decode::<VarLong>()?.0)
    }

    pub fn read_uuid(&mut self) -> Result<Uuid, ProtoError> {
        self.decode()
    }

    /// Length-prefixed byte array, at most `max` bytes.
    pub fn read_byte_array(&mut self, max: usize) -> Result<Vec<u8>, ProtoError> {
        let mut cursor = &self.buf[self.pos..];
        let before = cursor.len();
        let data = read_byte_array(&mut cursor, max)?;
        self.pos += before - cursor.len();
        Ok(data)
    }

    /// Length-prefixed UTF-8 string, at most `max` bytes.
    pub fn read_string(&mut self, max: usize) -> Result<String, ProtoError> {
        let mut cursor = &self.buf[self.pos..];
        let before = cursor.len();
        let s = read_string(&mut cursor, max)?;
        self.pos += before - cursor.len();
        Ok(s)
    }

    /// Everything left in the packet.
    pub fn read_remaining(&mut self) -> &[u8] {
        let start = self.pos;
        self.pos = self.buf.len();
        &self.buf[start..]
    }
}

impl fmt::Debug for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPacket")
            .field("id", &format_args!("0x{:02X}", self.id))
            .field("len", &self.buf.len())
            .field("pos", &self.pos)
            .finish()
    }
}
