//! Wire framing: `uvarint(len) | uvarint(packet id) | payload`, where `len`
//! covers the id and the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{Packet, ProtoEncode};
use crate::error::ProtoError;
use crate::packet::RawPacket;
use crate::pool::BufferPool;
use crate::types::{VarIntError, VarUInt32};

/// Largest frame body a peer may send (fits a 3-byte length prefix).
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// An outbound packet: id plus finished payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPacket {
    pub id: i32,
    pub payload: Bytes,
}

impl OutgoingPacket {
    pub fn new(id: i32, payload: Bytes) -> Self {
        Self { id, payload }
    }

    /// Encode a typed packet into its payload.
    pub fn from_packet<P: Packet + ProtoEncode>(packet: &P) -> Self {
        let mut payload = BytesMut::new();
        packet.proto_encode(&mut payload);
        Self::new(P::ID, payload.freeze())
    }

    /// Frame this packet for the wire.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, self.id, &self.payload);
        buf
    }
}

/// Append one complete frame to `buf`.
pub fn encode_frame(buf: &mut impl BufMut, id: i32, payload: &[u8]) {
    let id = VarUInt32(id as u32);
    VarUInt32((id.encoded_len() + payload.len()) as u32).proto_encode(buf);
    id.proto_encode(buf);
    buf.put_slice(payload);
}

/// Pull the next complete frame out of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed; the partial frame stays in
/// `buf`. Frames with no payload beyond the id (length 0 or 1) are dropped.
/// The payload is copied into a buffer leased from `pool`.
pub fn next_frame(buf: &mut BytesMut, pool: &BufferPool) -> Result<Option<RawPacket>, ProtoError> {
    loop {
        let (len, header) = match VarUInt32::decode(&buf[..]) {
            Ok((len, header)) => (len.0 as usize, header),
            Err(VarIntError::BufferTooShort) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if len > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        if buf.len() < header + len {
            return Ok(None);
        }
        if len <= 1 {
            buf.advance(header + len);
            continue;
        }

        let body = &buf[header..header + len];
        let (id, id_len) = VarUInt32::decode(body).map_err(ProtoError::from)?;
        let packet = pool.acquire(id.0 as i32, &body[id_len..]);
        buf.advance(header + len);
        return Ok(Some(packet));
    }
}
