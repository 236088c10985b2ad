//! Handshake-state packets, including the status exchange.

use bytes::{Buf, BufMut};

use crate::codec::{self, Packet, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::frame::OutgoingPacket;
use crate::packets::id;
use crate::response::ResponseBuilder;
use crate::status::StatusResponse;
use crate::types::VarInt;

/// Maximum length of the server address a client reports.
pub const MAX_ADDRESS_LEN: usize = 255;

/// What the client wants after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
    Unknown(i32),
}

impl From<i32> for NextState {
    fn from(v: i32) -> Self {
        match v {
            1 => NextState::Status,
            2 => NextState::Login,
            other => NextState::Unknown(other),
        }
    }
}

impl From<NextState> for i32 {
    fn from(v: NextState) -> Self {
        match v {
            NextState::Status => 1,
            NextState::Login => 2,
            NextState::Unknown(other) => other,
        }
    }
}

/// Handshake (0x00), serverbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: NextState,
}

impl Packet for Handshake {
    const ID: i32 = id::handshake::HANDSHAKE;
}

impl ProtoDecode for Handshake {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let protocol_version = VarInt::proto_decode(buf)?.0;
        let server_address = codec::read_string(buf, MAX_ADDRESS_LEN)?;
        codec::ensure_remaining(buf, 2)?;
        let server_port = buf.get_u16();
        let next_state = NextState::from(VarInt::proto_decode(buf)?.0);
        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            next_state,
        })
    }
}

impl ProtoEncode for Handshake {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.protocol_version).proto_encode(buf);
        codec::write_byte_array(buf, self.server_address.as_bytes());
        buf.put_u16(self.server_port);
        VarInt(self.next_state.into()).proto_encode(buf);
    }
}

/// Ping (0x01), serverbound. Echoed back unchanged as [`Pong`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub payload: i64,
}

impl Packet for Ping {
    const ID: i32 = id::handshake::PING;
}

impl ProtoDecode for Ping {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        codec::ensure_remaining(buf, 8)?;
        Ok(Self {
            payload: buf.get_i64(),
        })
    }
}

impl ProtoEncode for Ping {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.payload);
    }
}

/// Pong (0x01), clientbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    pub payload: i64,
}

impl Packet for Pong {
    const ID: i32 = id::handshake::PONG;
}

impl ProtoEncode for Pong {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.payload);
    }
}

/// Status response (0x00), clientbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponsePacket {
    pub status: StatusResponse,
}

impl Packet for StatusResponsePacket {
    const ID: i32 = id::handshake::STATUS_RESPONSE;
}

impl StatusResponsePacket {
    /// Serialize the status as JSON. Fails if it does not fit in one
    /// protocol string, which an oversized favicon can cause.
    pub fn to_packet(&self) -> Result<OutgoingPacket, ProtoError> {
        let mut out = ResponseBuilder::new();
        out.write_json(&self.status)?;
        Ok(out.build(Self::ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn handshake_roundtrip() {
        let pkt = Handshake {
            protocol_version: 340,
            server_address: "localhost".into(),
            server_port: 25565,
            next_state: NextState::Login,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        // 340 = 0xD4 0x02
        assert_eq!(&buf[..2], &[0xD4, 0x02]);
        let decoded = Handshake::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn handshake_address_bound() {
        let pkt = Handshake {
            protocol_version: 340,
            server_address: "a".repeat(300),
            server_port: 25565,
            next_state: NextState::Status,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert!(matches!(
            Handshake::proto_decode(&mut buf.freeze()),
            Err(ProtoError::StringTooLong { len: 300, max: 255 })
        ));
    }

    #[test]
    fn next_state_values() {
        assert_eq!(NextState::from(1), NextState::Status);
        assert_eq!(NextState::from(2), NextState::Login);
        assert_eq!(NextState::from(7), NextState::Unknown(7));
    }

    #[test]
    fn ping_echo_bytes() {
        let mut buf = BytesMut::new();
        Pong { payload: -5 }.proto_encode(&mut buf);
        let ping = Ping::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(ping.payload, -5);
    }

    #[test]
    fn status_response_is_json() {
        let status = StatusResponse::new("1.12.2", 340, 20, 1, "hello", None);
        let packet = StatusResponsePacket { status }.to_packet().unwrap();
        assert_eq!(packet.id, id::handshake::STATUS_RESPONSE);
        let json = codec::read_string(&mut packet.payload.clone(), codec::MAX_STRING_LEN).unwrap();
        let back: StatusResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.players.online, 1);
    }

    #[test]
    fn oversized_favicon_fails_cleanly() {
        let favicon = format!("data:image/png;base64,{}", "A".repeat(codec::MAX_STRING_LEN));
        let status = StatusResponse::new("1.12.2", 340, 20, 0, "hello", Some(favicon));
        assert!(matches!(
            StatusResponsePacket { status }.to_packet(),
            Err(ProtoError::StringTooLong { .. })
        ));
    }

    #[test]
    fn ping_too_short() {
        let data = [0u8; 7];
        assert!(Ping::proto_decode(&mut &data[..]).is_err());
    }
}
