//! Login-state packets.

use bytes::{Buf, BufMut};

use crate::codec::{self, Packet, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::frame::OutgoingPacket;
use crate::packets::id;
use crate::response::ResponseBuilder;
use crate::types::Uuid;
use crate::username::MAX_USERNAME_LEN;

/// Upper bound for the RSA-encrypted fields of [`EncryptionResponse`].
pub const MAX_ENCRYPTED_LEN: usize = 256;

/// Login Start (0x00), serverbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub username: String,
}

impl Packet for LoginStart {
    const ID: i32 = id::login::LOGIN_START;
}

impl ProtoDecode for LoginStart {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            username: codec::read_string(buf, MAX_USERNAME_LEN)?,
        })
    }
}

impl ProtoEncode for LoginStart {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, self.username.as_bytes());
    }
}

/// Encryption Request (0x01), clientbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequest {
    /// Always empty on modern servers.
    pub server_id: String,
    /// SubjectPublicKeyInfo DER.
    pub public_key: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl Packet for EncryptionRequest {
    const ID: i32 = id::login::ENCRYPTION_REQUEST;
}

impl ProtoEncode for EncryptionRequest {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, self.server_id.as_bytes());
        codec::write_byte_array(buf, &self.public_key);
        codec::write_byte_array(buf, &self.verify_token);
    }
}

impl ProtoDecode for EncryptionRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let server_id = codec::read_string(buf, 20)?;
        let public_key = codec::read_byte_array(buf, codec::MAX_STRING_LEN)?;
        let verify_token = codec::read_byte_array(buf, MAX_ENCRYPTED_LEN)?;
        Ok(Self {
            server_id,
            public_key,
            verify_token,
        })
    }
}

/// Encryption Response (0x01), serverbound. Both fields are encrypted
/// with the server's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResponse {
    pub shared_secret: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl Packet for EncryptionResponse {
    const ID: i32 = id::login::ENCRYPTION_RESPONSE;
}

impl ProtoDecode for EncryptionResponse {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let shared_secret = codec::read_byte_array(buf, MAX_ENCRYPTED_LEN)?;
        let verify_token = codec::read_byte_array(buf, MAX_ENCRYPTED_LEN)?;
        Ok(Self {
            shared_secret,
            verify_token,
        })
    }
}

impl ProtoEncode for EncryptionResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, &self.shared_secret);
        codec::write_byte_array(buf, &self.verify_token);
    }
}

/// Login Success (0x02), clientbound. The id is sent as hyphenated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub username: String,
}

impl Packet for LoginSuccess {
    const ID: i32 = id::login::LOGIN_SUCCESS;
}

impl ProtoEncode for LoginSuccess {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, self.uuid.to_string().as_bytes());
        codec::write_byte_array(buf, self.username.as_bytes());
    }
}

impl ProtoDecode for LoginSuccess {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let uuid = codec::read_string(buf, 36)?.parse()?;
        let username = codec::read_string(buf, MAX_USERNAME_LEN)?;
        Ok(Self { uuid, username })
    }
}

/// Disconnect (0x00), clientbound, during login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDisconnect {
    pub reason: String,
}

impl Packet for LoginDisconnect {
    const ID: i32 = id::login::DISCONNECT;
}

impl LoginDisconnect {
    pub fn to_packet(&self) -> Result<OutgoingPacket, ProtoError> {
        let mut out = ResponseBuilder::new();
        out.write_chat(&self.reason)?;
        Ok(out.build(Self::ID))
    }
}
