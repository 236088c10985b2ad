//! Base data types used throughout the Java Edition protocol.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use md5::{Digest, Md5};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum VarIntError {
    #[error("buffer too short")]
    BufferTooShort,
    #[error("VarInt is too long (more than {max_bytes} bytes)")]
    TooManyBytes { max_bytes: usize },
}

// ---------------------------------------------------------------------------
// VarUInt32 (unsigned LEB128)
// ---------------------------------------------------------------------------

/// Unsigned variable-length integer, 1 to 5 bytes.
/// Used for frame lengths, packet ids and array/string lengths.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarUInt32(pub u32);

impl VarUInt32 {
    pub const MAX_BYTES: usize = 5;

    /// Number of bytes this value occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self.0 {
            0..=0x7F => 1,
            0x80..=0x3FFF => 2,
            0x4000..=0x1F_FFFF => 3,
            0x20_0000..=0xFFF_FFFF => 4,
            _ => 5,
        }
    }

    /// Decode from a byte slice. Returns the value and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), VarIntError> {
        let mut result: u32 = 0;
        let mut shift: u32 = 0;
        for (i, &byte) in buf.iter().enumerate() {
            if i >= Self::MAX_BYTES {
                return Err(VarIntError::TooManyBytes {
                    max_bytes: Self::MAX_BYTES,
                });
            }
            result |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok((VarUInt32(result), i + 1));
            }
            shift += 7;
        }
        Err(VarIntError::BufferTooShort)
    }
}

impl ProtoEncode for VarUInt32 {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let mut value = self.0;
        loop {
            if value & !0x7F == 0 {
                buf.put_u8(value as u8);
                return;
            }
            buf.put_u8((value & 0x7F | 0x80) as u8);
            value >>= 7;
        }
    }
}

impl ProtoDecode for VarUInt32 {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let mut result: u32 = 0;
        let mut shift: u32 = 0;
        for i in 0..Self::MAX_BYTES {
            if !buf.has_remaining() {
                return Err(VarIntError::BufferTooShort.into());
            }
            let byte = buf.get_u8();
            result |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(VarUInt32(result));
            }
            shift += 7;
            if i == Self::MAX_BYTES - 1 {
                return Err(VarIntError::TooManyBytes {
                    max_bytes: Self::MAX_BYTES,
                }
                .into());
            }
        }
        Err(VarIntError::BufferTooShort.into())
    }
}

impl From<u32> for VarUInt32 {
    fn from(v: u32) -> Self {
        VarUInt32(v)
    }
}

impl From<VarUInt32> for u32 {
    fn from(v: VarUInt32) -> Self {
        v.0
    }
}

impl fmt::Debug for VarUInt32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarUInt32({})", self.0)
    }
}

impl fmt::Display for VarUInt32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// VarInt (i32, two's complement over the unsigned encoding)
// ---------------------------------------------------------------------------

/// Signed variable-length integer. Negative values always take 5 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarInt(pub i32);

impl VarInt {
    pub const MAX_BYTES: usize = 5;

    pub fn encoded_len(&self) -> usize {
        VarUInt32(self.0 as u32).encoded_len()
    }
}

impl ProtoEncode for VarInt {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt32(self.0 as u32).proto_encode(buf);
    }
}

impl ProtoDecode for VarInt {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(VarInt(VarUInt32::proto_decode(buf)?.0 as i32))
    }
}

impl From<i32> for VarInt {
    fn from(v: i32) -> Self {
        VarInt(v)
    }
}

impl From<VarInt> for i32 {
    fn from(v: VarInt) -> Self {
        v.0
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarInt({})", self.0)
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// VarLong (i64, two's complement over unsigned LEB128)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarLong(pub i64);

impl VarLong {
    /// Maximum bytes a VarLong can occupy.
    pub const MAX_BYTES: usize = 10;
}

impl ProtoEncode for VarLong {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let mut value = self.0 as u64;
        loop {
            if value & !0x7F == 0 {
                buf.put_u8(value as u8);
                return;
            }
            buf.put_u8((value & 0x7F | 0x80) as u8);
            value >>= 7;
        }
    }
}

impl ProtoDecode for VarLong {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        for i in 0..Self::MAX_BYTES {
            if !buf.has_remaining() {
                return Err(VarIntError::BufferTooShort.into());
            }
            let byte = buf.get_u8();
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(VarLong(result as i64));
            }
            shift += 7;
            if i == Self::MAX_BYTES - 1 {
                return Err(VarIntError::TooManyBytes {
                    max_bytes: Self::MAX_BYTES,
                }
                .into());
            }
        }
        Err(VarIntError::BufferTooShort.into())
    }
}

impl fmt::Debug for VarLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarLong({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Uuid (two big-endian u64 halves)
// ---------------------------------------------------------------------------

/// 128-bit UUID as sent on the wire: most significant half first, both big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid {
    pub most_significant: u64,
    pub least_significant: u64,
}

impl Uuid {
    pub const ZERO: Self = Self {
        most_significant: 0,
        least_significant: 0,
    };

    pub const fn new(most: u64, least: u64) -> Self {
        Self {
            most_significant: most,
            least_significant: least,
        }
    }

    pub fn from_bytes(b: [u8; 16]) -> Self {
        let mut most = [0u8; 8];
        let mut least = [0u8; 8];
        most.copy_from_slice(&b[..8]);
        least.copy_from_slice(&b[8..]);
        Self::new(u64::from_be_bytes(most), u64::from_be_bytes(least))
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut b = [0u8; 16];
        b[..8].copy_from_slice(&self.most_significant.to_be_bytes());
        b[8..].copy_from_slice(&self.least_significant.to_be_bytes());
        b
    }

    /// Name-based (type 3) UUID: MD5 of `name`, with the version and variant bits forced.
    pub fn name_based(name: &[u8]) -> Self {
        let mut b: [u8; 16] = Md5::digest(name).into();
        b[6] &= 0x0F;
        b[6] |= 0x30;
        b[8] &= 0x3F;
        b[8] |= 0x80;
        Self::from_bytes(b)
    }

    /// Stable identity for a player on a server that skips the session service.
    pub fn offline_player(username: &str) -> Self {
        Self::name_based(format!("OfflinePlayer:{username}").as_bytes())
    }

    pub fn version(&self) -> u8 {
        ((self.most_significant >> 12) & 0x0F) as u8
    }

    /// Lowercase hex without hyphens, as used by the session service.
    pub fn simple(&self) -> String {
        format!(
            "{:016x}{:016x}",
            self.most_significant, self.least_significant
        )
    }
}

impl ProtoEncode for Uuid {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.most_significant);
        buf.put_u64(self.least_significant);
    }
}

impl ProtoDecode for Uuid {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        if buf.remaining() < 16 {
            return Err(ProtoError::BufferTooShort {
                needed: 16,
                remaining: buf.remaining(),
            });
        }
        Ok(Self {
            most_significant: buf.get_u64(),
            least_significant: buf.get_u64(),
        })
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.simple();
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..]
        )
    }
}

/// Accepts both the hyphenated form and the bare 32-digit form.
impl FromStr for Uuid {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|&c| c != '-').collect();
        let well_formed = hex.len() == 32
            && hex.chars().all(|c| c.is_ascii_hexdigit())
            && (hex.len() == s.len() || is_hyphenated(s));
        if !well_formed {
            return Err(ProtoError::InvalidUuid(s.to_string()));
        }
        let most = u64::from_str_radix(&hex[..16], 16)
            .map_err(|_| ProtoError::InvalidUuid(s.to_string()))?;
        let least = u64::from_str_radix(&hex[16..], 16)
            .map_err(|_| ProtoError::InvalidUuid(s.to_string()))?;
        Ok(Self::new(most, least))
    }
}

fn is_hyphenated(s: &str) -> bool {
    let groups: Vec<usize> = s.split('-').map(str::len).collect();
    groups == [8, 4, 4, 4, 12]
}

impl Serialize for Uuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Position (f64 x, y, z + rotation)
// ---------------------------------------------------------------------------

/// An entity location: coordinates plus yaw/pitch in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self {
            x,
            y,
            z,
            yaw,
            pitch,
        }
    }

    pub fn distance_squared(&self, other: &Location) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip_varint(v: i32) -> (i32, usize) {
        let mut buf = BytesMut::new();
        VarInt(v).proto_encode(&mut buf);
        let len = buf.len();
        let decoded = VarInt::proto_decode(&mut buf.freeze()).unwrap();
        (decoded.0, len)
    }

    #[test]
    fn varint_roundtrip_edges() {
        for v in [0, 1, -1, 127, 128, 255, 25565, 2_097_151, i32::MIN, i32::MAX] {
            let (decoded, len) = roundtrip_varint(v);
            assert_eq!(decoded, v);
            assert!((1..=5).contains(&len), "{v} took {len} bytes");
        }
    }

    #[test]
    fn varint_known_encodings() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (255, &[0xFF, 0x01]),
            (2_147_483_647, &[0xFF, 0xFF, 0xFF, 0xFF, 0x07]),
            (-1, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
            (-2_147_483_648, &[0x80, 0x80, 0x80, 0x80, 0x08]),
        ];
        for &(value, expected) in cases {
            let mut buf = BytesMut::new();
            VarInt(value).proto_encode(&mut buf);
            assert_eq!(&buf[..], expected, "encoding of {value}");
            assert_eq!(VarInt(value).encoded_len(), expected.len());
        }
    }

    #[test]
    fn varuint_roundtrip_edges() {
        for v in [0u32, 1, 127, 128, 16_383, 16_384, u32::MAX] {
            let mut buf = BytesMut::new();
            VarUInt32(v).proto_encode(&mut buf);
            assert_eq!(buf.len(), VarUInt32(v).encoded_len());
            let (decoded, used) = VarUInt32::decode(&buf).unwrap();
            assert_eq!(decoded.0, v);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn varint_too_long() {
        let data = [0x80u8, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(VarUInt32::proto_decode(&mut &data[..]).is_err());
        assert!(matches!(
            VarUInt32::decode(&data),
            Err(VarIntError::TooManyBytes { .. })
        ));
    }

    #[test]
    fn varint_truncated() {
        let data = [0x80u8, 0x80];
        assert!(VarInt::proto_decode(&mut &data[..]).is_err());
        assert!(matches!(
            VarUInt32::decode(&data),
            Err(VarIntError::BufferTooShort)
        ));
    }

    #[test]
    fn varlong_roundtrip() {
        for v in [0i64, 1, -1, i64::MIN, i64::MAX, 1 << 40] {
            let mut buf = BytesMut::new();
            VarLong(v).proto_encode(&mut buf);
            assert!(buf.len() <= VarLong::MAX_BYTES);
            let decoded = VarLong::proto_decode(&mut buf.freeze()).unwrap();
            assert_eq!(decoded.0, v);
        }
    }

    #[test]
    fn offline_uuid_is_stable_type_3() {
        let a = Uuid::offline_player("Alice");
        let b = Uuid::offline_player("Alice");
        assert_eq!(a, b);
        assert_eq!(a, Uuid::name_based(b"OfflinePlayer:Alice"));
        assert_eq!(a.version(), 3);
        // IETF variant: top two bits of byte 8 are 10.
        assert_eq!(a.to_bytes()[8] & 0xC0, 0x80);
        assert_ne!(a, Uuid::offline_player("alice"));
    }

    #[test]
    fn offline_uuid_known_value() {
        let notch = Uuid::offline_player("Notch");
        assert_eq!(notch.to_string(), "b50ad385-829d-3141-a216-7e7d7539ba7f");
    }

    #[test]
    fn name_based_halves_follow_digest_order() {
        let uuid = Uuid::name_based(b"OfflinePlayer:Alice");
        let mut digest: [u8; 16] = Md5::digest(b"OfflinePlayer:Alice").into();
        digest[6] = (digest[6] & 0x0F) | 0x30;
        digest[8] = (digest[8] & 0x3F) | 0x80;
        assert_eq!(uuid.to_bytes(), digest);
    }

    #[test]
    fn uuid_display_and_parse() {
        let uuid: Uuid = "069a79f444e94726a5befca90e38aaf5".parse().unwrap();
        assert_eq!(uuid.to_string(), "069a79f4-44e9-4726-a5be-fca90e38aaf5");
        let dashed: Uuid = "069a79f4-44e9-4726-a5be-fca90e38aaf5".parse().unwrap();
        assert_eq!(uuid, dashed);
        assert_eq!(uuid.simple(), "069a79f444e94726a5befca90e38aaf5");
    }

    #[test]
    fn uuid_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<Uuid>().is_err());
        assert!("069a79f444e94726a5befca90e38aaf".parse::<Uuid>().is_err());
        assert!("069a79f4-44e94726-a5be-fca9-0e38aaf5".parse::<Uuid>().is_err());
        assert!("zz9a79f444e94726a5befca90e38aaf5".parse::<Uuid>().is_err());
    }

    #[test]
    fn uuid_wire_is_big_endian() {
        let uuid = Uuid::new(0x0102_0304_0506_0708, 0x090A_0B0C_0D0E_0F10);
        let mut buf = BytesMut::new();
        uuid.proto_encode(&mut buf);
        assert_eq!(&buf[..], &uuid.to_bytes());
        assert_eq!(buf[0], 0x01);
        let decoded = Uuid::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, uuid);
    }

    #[test]
    fn uuid_serde_as_string() {
        let uuid = Uuid::offline_player("Steve");
        let json = serde_json::to_string(&uuid).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
        let back: Uuid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uuid);
    }
}
