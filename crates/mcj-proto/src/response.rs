//! Chained-write accumulator for outbound packet payloads.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::chat::ChatComponent;
use crate::codec::{write_byte_array, write_string, ProtoEncode, MAX_STRING_LEN};
use crate::error::ProtoError;
use crate::frame::OutgoingPacket;
use crate::types::{Uuid, VarInt, VarLong, VarUInt32};

/// Accumulates one packet's payload. Each `write_*` returns `&mut Self` so
/// fields can be chained in wire order.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    data: BytesMut,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.data.put_u8(v);
        self
    }

    pub fn write_i8(&mut self, v: i8) -> &mut Self {
        self.data.put_i8(v);
        self
    }

    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.data.put_u8(v as u8);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.data.put_u16(v);
        self
    }

    pub fn write_i16(&mut self, v: i16) -> &mut Self {
        self.data.put_i16(v);
        self
    }

    pub fn write_i32(&mut self, v: i32) -> &mut Self {
        self.data.put_i32(v);
        self
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.data.put_i64(v);
        self
    }

    pub fn write_f32(&mut self, v: f32) -> &mut Self {
        self.data.put_f32(v);
        self
    }

    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        self.data.put_f64(v);
        self
    }

    pub fn write_varint(&mut self, v: i32) -> &mut Self {
        VarInt(v).proto_encode(&mut self.data);
        self
    }

    pub fn write_uvarint(&mut self, v: u32) -> &mut Self {
        VarUInt32(v).proto_encode(&mut self.data);
        self
    }

    pub fn write_varlong(&mut self, v: i64) -> &mut Self {
        VarLong(v).proto_encode(&mut self.data);
        self
    }

    pub fn write_uuid(&mut self, v: Uuid) -> &mut Self {
        v.proto_encode(&mut self.data);
        self
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.data.put_slice(data);
        self
    }

    pub fn write_byte_array(&mut self, data: &[u8]) -> &mut Self {
        write_byte_array(&mut self.data, data);
        self
    }

    /// String bounded only by the protocol-wide limit.
    pub fn write_string(&mut self, s: &str) -> Result<&mut Self, ProtoError> {
        self.write_bounded_string(s, MAX_STRING_LEN)
    }

    /// String that must fit in `max` bytes. Nothing is written on failure.
    pub fn write_bounded_string(&mut self, s: &str, max: usize) -> Result<&mut Self, ProtoError> {
        write_string(&mut self.data, s, max)?;
        Ok(self)
    }

    /// Serialize `value` to JSON and write it as a string.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, ProtoError> {
        let json = serde_json::to_string(value)?;
        self.write_string(&json)
    }

    /// A plain `{"text": ...}` chat component.
    pub fn write_chat(&mut self, text: &str) -> Result<&mut Self, ProtoError> {
        self.write_string(&ChatComponent::text(text).to_json())
    }

    /// Anything with a wire encoding.
    pub fn write<T: ProtoEncode>(&mut self, value: &T) -> &mut Self {
        value.proto_encode(&mut self.data);
        self
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    /// Finish the payload and pair it with a packet id.
    pub fn build(self, id: i32) -> OutgoingPacket {
        OutgoingPacket::new(id, self.data.freeze())
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
