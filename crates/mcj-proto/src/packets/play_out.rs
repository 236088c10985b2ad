//! Clientbound play packets.

use bytes::{Buf, BufMut};

use crate::chat::{ChatComponent, ChatPosition};
use crate::codec::{self, Packet, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::frame::OutgoingPacket;
use crate::packets::id;
use crate::profile::Property;
use crate::response::ResponseBuilder;
use crate::types::{Uuid, VarInt};

/// Chat Message (0x0F), clientbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessageOut {
    /// JSON chat component.
    pub json: String,
    pub position: ChatPosition,
}

impl ChatMessageOut {
    pub fn text(text: &str, position: ChatPosition) -> Self {
        Self {
            json: ChatComponent::text(text).to_json(),
            position,
        }
    }

    /// Encode, refusing a component longer than the protocol string limit.
    pub fn to_packet(&self) -> Result<OutgoingPacket, ProtoError> {
        let mut out = ResponseBuilder::new();
        out.write_string(&self.json)?.write_i8(self.position as i8);
        Ok(out.build(Self::ID))
    }
}

impl Packet for ChatMessageOut {
    const ID: i32 = id::play_out::CHAT_MESSAGE;
}

impl ProtoDecode for ChatMessageOut {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let json = codec::read_string(buf, codec::MAX_STRING_LEN)?;
        codec::ensure_remaining(buf, 1)?;
        let position = match buf.get_i8() {
            0 => ChatPosition::Chat,
            1 => ChatPosition::System,
            2 => ChatPosition::ActionBar,
            other => {
                return Err(ProtoError::InvalidData(format!(
                    "unknown chat position {other}"
                )))
            }
        };
        Ok(Self { json, position })
    }
}

/// Disconnect (0x1A) during play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kick {
    pub reason: String,
}

impl Packet for Kick {
    const ID: i32 = id::play_out::DISCONNECT;
}

impl Kick {
    pub fn to_packet(&self) -> Result<OutgoingPacket, ProtoError> {
        let mut out = ResponseBuilder::new();
        out.write_chat(&self.reason)?;
        Ok(out.build(Self::ID))
    }
}

impl ProtoDecode for Kick {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let json = codec::read_string(buf, codec::MAX_STRING_LEN)?;
        let component: ChatComponent = serde_json::from_str(&json)?;
        Ok(Self {
            reason: component.text,
        })
    }
}

/// Keep Alive (0x1F), carrying an id the client must echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveOut {
    pub id: i64,
}

impl Packet for KeepAliveOut {
    const ID: i32 = id::play_out::KEEP_ALIVE;
}

impl ProtoEncode for KeepAliveOut {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.id);
    }
}

impl ProtoDecode for KeepAliveOut {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        codec::ensure_remaining(buf, 8)?;
        Ok(Self { id: buf.get_i64() })
    }
}

/// Join Game (0x23).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGame {
    pub entity_id: i32,
    pub gamemode: u8,
    pub dimension: i32,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    pub reduced_debug_info: bool,
}

impl Packet for JoinGame {
    const ID: i32 = id::play_out::JOIN_GAME;
}

impl ProtoEncode for JoinGame {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.entity_id);
        buf.put_u8(self.gamemode);
        buf.put_i32(self.dimension);
        buf.put_u8(self.difficulty);
        buf.put_u8(self.max_players);
        codec::write_byte_array(buf, self.level_type.as_bytes());
        buf.put_u8(self.reduced_debug_info as u8);
    }
}

impl ProtoDecode for JoinGame {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        codec::ensure_remaining(buf, 11)?;
        let entity_id = buf.get_i32();
        let gamemode = buf.get_u8();
        let dimension = buf.get_i32();
        let difficulty = buf.get_u8();
        let max_players = buf.get_u8();
        let level_type = codec::read_string(buf, 16)?;
        codec::ensure_remaining(buf, 1)?;
        let reduced_debug_info = buf.get_u8() != 0;
        Ok(Self {
            entity_id,
            gamemode,
            dimension,
            difficulty,
            max_players,
            level_type,
            reduced_debug_info,
        })
    }
}

/// Player Abilities (0x2C), clientbound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerAbilities {
    pub flags: i8,
    pub flying_speed: f32,
    pub fov_modifier: f32,
}

impl Packet for PlayerAbilities {
    const ID: i32 = id::play_out::PLAYER_ABILITIES;
}

impl ProtoEncode for PlayerAbilities {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i8(self.flags);
        buf.put_f32(self.flying_speed);
        buf.put_f32(self.fov_modifier);
    }
}

/// One row of the tab list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerListEntry {
    pub uuid: Uuid,
    pub name: String,
    pub properties: Vec<Property>,
    pub gamemode: i32,
    pub ping: i32,
    pub display_name: Option<String>,
}

/// Player List Item (0x2E). Only the add and remove actions are used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerListItem {
    Add(Vec<PlayerListEntry>),
    Remove(Vec<Uuid>),
}

const ACTION_ADD_PLAYER: i32 = 0;
const ACTION_REMOVE_PLAYER: i32 = 4;

impl Packet for PlayerListItem {
    const ID: i32 = id::play_out::PLAYER_LIST_ITEM;
}

impl ProtoEncode for PlayerListItem {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        match self {
            PlayerListItem::Add(entries) => {
                VarInt(ACTION_ADD_PLAYER).proto_encode(buf);
                VarInt(entries.len() as i32).proto_encode(buf);
                for entry in entries {
                    entry.uuid.proto_encode(buf);
                    codec::write_byte_array(buf, entry.name.as_bytes());
                    VarInt(entry.properties.len() as i32).proto_encode(buf);
                    for prop in &entry.properties {
                        codec::write_byte_array(buf, prop.name.as_bytes());
                        codec::write_byte_array(buf, prop.value.as_bytes());
                        buf.put_u8(prop.signature.is_some() as u8);
                        if let Some(sig) = &prop.signature {
                            codec::write_byte_array(buf, sig.as_bytes());
                        }
                    }
                    VarInt(entry.gamemode).proto_encode(buf);
                    VarInt(entry.ping).proto_encode(buf);
                    buf.put_u8(entry.display_name.is_some() as u8);
                    if let Some(name) = &entry.display_name {
                        codec::write_byte_array(
                            buf,
                            ChatComponent::text(name.as_str()).to_json().as_bytes(),
                        );
                    }
                }
            }
            PlayerListItem::Remove(ids) => {
                VarInt(ACTION_REMOVE_PLAYER).proto_encode(buf);
                VarInt(ids.len() as i32).proto_encode(buf);
                for id in ids {
                    id.proto_encode(buf);
                }
            }
        }
    }
}

fn get_bool(buf: &mut impl Buf) -> Result<bool, ProtoError> {
    codec::ensure_remaining(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

fn get_count(buf: &mut impl Buf) -> Result<usize, ProtoError> {
    let count = VarInt::proto_decode(buf)?.0;
    usize::try_from(count).map_err(|_| ProtoError::InvalidData(format!("negative count {count}")))
}

impl ProtoDecode for PlayerListItem {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let action = VarInt::proto_decode(buf)?.0;
        let count = get_count(buf)?;
        match action {
            ACTION_ADD_PLAYER => {
                let mut entries = Vec::new();
                for _ in 0..count {
                    let uuid = Uuid::proto_decode(buf)?;
                    let name = codec::read_string(buf, 16)?;
                    let prop_count = get_count(buf)?;
                    let mut properties = Vec::new();
                    for _ in 0..prop_count {
                        let name = codec::read_string(buf, codec::MAX_STRING_LEN)?;
                        let value = codec::read_string(buf, codec::MAX_STRING_LEN)?;
                        let signature = if get_bool(buf)? {
                            Some(codec::read_string(buf, codec::MAX_STRING_LEN)?)
                        } else {
                            None
                        };
                        properties.push(Property {
                            name,
                            value,
                            signature,
                        });
                    }
                    let gamemode = VarInt::proto_decode(buf)?.0;
                    let ping = VarInt::proto_decode(buf)?.0;
                    let display_name = if get_bool(buf)? {
                        let json = codec::read_string(buf, codec::MAX_STRING_LEN)?;
                        let component: ChatComponent = serde_json::from_str(&json)?;
                        Some(component.text)
                    } else {
                        None
                    };
                    entries.push(PlayerListEntry {
                        uuid,
                        name,
                        properties,
                        gamemode,
                        ping,
                        display_name,
                    });
                }
                Ok(PlayerListItem::Add(entries))
            }
            ACTION_REMOVE_PLAYER => {
                let mut ids = Vec::new();
                for _ in 0..count {
                    ids.push(Uuid::proto_decode(buf)?);
                }
                Ok(PlayerListItem::Remove(ids))
            }
            other => Err(ProtoError::InvalidData(format!(
                "unsupported player list action {other}"
            ))),
        }
    }
}

/// Player Position And Look (0x2F), clientbound teleport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPositionAndLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    /// Bit set = field is relative.
    pub flags: i8,
    pub teleport_id: i32,
}

impl Packet for PlayerPositionAndLook {
    const ID: i32 = id::play_out::PLAYER_POSITION_AND_LOOK;
}

impl ProtoEncode for PlayerPositionAndLook {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_i8(self.flags);
        VarInt(self.teleport_id).proto_encode(buf);
    }
}

impl ProtoDecode for PlayerPositionAndLook {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        codec::ensure_remaining(buf, 33)?;
        let x = buf.get_f64();
        let y = buf.get_f64();
        let z = buf.get_f64();
        let yaw = buf.get_f32();
        let pitch = buf.get_f32();
        let flags = buf.get_i8();
        let teleport_id = VarInt::proto_decode(buf)?.0;
        Ok(Self {
            x,
            y,
            z,
            yaw,
            pitch,
            flags,
            teleport_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn chat_out_layout() {
        let packet = ChatMessageOut::text("hi", ChatPosition::System)
            .to_packet()
            .unwrap();
        assert_eq!(packet.id, id::play_out::CHAT_MESSAGE);
        let buf = packet.payload;
        let json = br#"{"text":"hi"}"#;
        assert_eq!(buf[0] as usize, json.len());
        assert_eq!(&buf[1..1 + json.len()], json);
        assert_eq!(buf[buf.len() - 1], 1);
        let decoded = ChatMessageOut::proto_decode(&mut buf.clone()).unwrap();
        assert_eq!(decoded.position, ChatPosition::System);
    }

    #[test]
    fn kick_roundtrip() {
        let packet = Kick {
            reason: "Timed out.".into(),
        }
        .to_packet()
        .unwrap();
        assert_eq!(packet.id, id::play_out::DISCONNECT);
        assert_eq!(Kick::proto_decode(&mut packet.payload.clone()).unwrap().reason, "Timed out.");
    }

    #[test]
    fn oversized_kick_reason_is_refused() {
        let kick = Kick {
            reason: "x".repeat(codec::MAX_STRING_LEN),
        };
        assert!(matches!(kick.to_packet(), Err(ProtoError::StringTooLong { .. })));
        let chat = ChatMessageOut::text(&"x".repeat(codec::MAX_STRING_LEN), ChatPosition::Chat);
        assert!(chat.to_packet().is_err());
    }

    #[test]
    fn join_game_roundtrip() {
        let pkt = JoinGame {
            entity_id: 7,
            gamemode: 0,
            dimension: 0,
            difficulty: 0,
            max_players: 20,
            level_type: "default".into(),
            reduced_debug_info: false,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(buf.len(), 4 + 1 + 4 + 1 + 1 + 8 + 1);
        assert_eq!(JoinGame::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }

    #[test]
    fn player_list_add_roundtrip() {
        let pkt = PlayerListItem::Add(vec![PlayerListEntry {
            uuid: Uuid::offline_player("Alice"),
            name: "Alice".into(),
            properties: vec![Property {
                name: "textures".into(),
                value: "abc".into(),
                signature: Some("sig".into()),
            }],
            gamemode: 0,
            ping: 12,
            display_name: None,
        }]);
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(PlayerListItem::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }

    #[test]
    fn player_list_remove_layout() {
        let uuid = Uuid::offline_player("Bob");
        let mut buf = BytesMut::new();
        PlayerListItem::Remove(vec![uuid]).proto_encode(&mut buf);
        assert_eq!(buf[0], 4);
        assert_eq!(buf[1], 1);
        assert_eq!(&buf[2..], &uuid.to_bytes());
    }

    #[test]
    fn position_and_look_layout() {
        let pkt = PlayerPositionAndLook {
            x: 0.0,
            y: 80.0,
            z: 0.0,
            yaw: 90.0,
            pitch: 0.0,
            flags: 0,
            teleport_id: 300,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(buf.len(), 33 + 2);
        assert_eq!(PlayerPositionAndLook::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }
}
