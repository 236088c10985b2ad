//! Serverbound play packets.

use bytes::{Buf, BufMut};

use crate::codec::{self, Packet, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::id;
use crate::types::VarInt;

/// Longest chat line a client may send.
pub const MAX_CHAT_LEN: usize = 256;
/// Longest locale tag, e.g. `en_us`.
pub const MAX_LOCALE_LEN: usize = 16;
/// Longest plugin channel name.
pub const MAX_CHANNEL_LEN: usize = 20;

fn get_f64(buf: &mut impl Buf) -> Result<f64, ProtoError> {
    codec::ensure_remaining(buf, 8)?;
    Ok(buf.get_f64())
}

fn get_f32(buf: &mut impl Buf) -> Result<f32, ProtoError> {
    codec::ensure_remaining(buf, 4)?;
    Ok(buf.get_f32())
}

fn get_u8(buf: &mut impl Buf) -> Result<u8, ProtoError> {
    codec::ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_i16(buf: &mut impl Buf) -> Result<i16, ProtoError> {
    codec::ensure_remaining(buf, 2)?;
    Ok(buf.get_i16())
}

/// Teleport Confirm (0x00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeleportConfirm {
    pub teleport_id: i32,
}

impl Packet for TeleportConfirm {
    const ID: i32 = id::play_in::TELEPORT_CONFIRM;
}

impl ProtoDecode for TeleportConfirm {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            teleport_id: VarInt::proto_decode(buf)?.0,
        })
    }
}

impl ProtoEncode for TeleportConfirm {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.teleport_id).proto_encode(buf);
    }
}

/// Chat Message (0x02).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub message: String,
}

impl Packet for ChatMessage {
    const ID: i32 = id::play_in::CHAT_MESSAGE;
}

impl ProtoDecode for ChatMessage {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            message: codec::read_string(buf, MAX_CHAT_LEN)?,
        })
    }
}

impl ProtoEncode for ChatMessage {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, self.message.as_bytes());
    }
}

/// Client Status action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatusAction {
    PerformRespawn,
    RequestStats,
    Unknown(i32),
}

/// Client Status (0x03).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStatus {
    pub action: ClientStatusAction,
}

impl Packet for ClientStatus {
    const ID: i32 = id::play_in::CLIENT_STATUS;
}

impl ProtoDecode for ClientStatus {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let action = match VarInt::proto_decode(buf)?.0 {
            0 => ClientStatusAction::PerformRespawn,
            1 => ClientStatusAction::RequestStats,
            other => ClientStatusAction::Unknown(other),
        };
        Ok(Self { action })
    }
}

/// Which chat lines the client wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    Enabled,
    CommandsOnly,
    Hidden,
    Unknown(i32),
}

impl From<i32> for ChatMode {
    fn from(v: i32) -> Self {
        match v {
            0 => ChatMode::Enabled,
            1 => ChatMode::CommandsOnly,
            2 => ChatMode::Hidden,
            other => ChatMode::Unknown(other),
        }
    }
}

impl From<ChatMode> for i32 {
    fn from(v: ChatMode) -> Self {
        match v {
            ChatMode::Enabled => 0,
            ChatMode::CommandsOnly => 1,
            ChatMode::Hidden => 2,
            ChatMode::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MainHand {
    Left,
    #[default]
    Right,
}

/// Client Settings (0x04). Copied as-is onto the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub locale: String,
    pub view_distance: u8,
    pub chat_mode: ChatMode,
    pub chat_colors: bool,
    /// Bitmask of displayed skin layers.
    pub skin_parts: u8,
    pub main_hand: MainHand,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            locale: "en_us".into(),
            view_distance: 10,
            chat_mode: ChatMode::Enabled,
            chat_colors: true,
            skin_parts: 0x7F,
            main_hand: MainHand::Right,
        }
    }
}

impl Packet for ClientSettings {
    const ID: i32 = id::play_in::CLIENT_SETTINGS;
}

impl ProtoDecode for ClientSettings {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let locale = codec::read_string(buf, MAX_LOCALE_LEN)?;
        let view_distance = get_u8(buf)?;
        let chat_mode = ChatMode::from(VarInt::proto_decode(buf)?.0);
        let chat_colors = get_u8(buf)? != 0;
        let skin_parts = get_u8(buf)?;
        let main_hand = match VarInt::proto_decode(buf)?.0 {
            0 => MainHand::Left,
            _ => MainHand::Right,
        };
        Ok(Self {
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            skin_parts,
            main_hand,
        })
    }
}

impl ProtoEncode for ClientSettings {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, self.locale.as_bytes());
        buf.put_u8(self.view_distance);
        VarInt(self.chat_mode.into()).proto_encode(buf);
        buf.put_u8(self.chat_colors as u8);
        buf.put_u8(self.skin_parts);
        VarInt(match self.main_hand {
            MainHand::Left => 0,
            MainHand::Right => 1,
        })
        .proto_encode(buf);
    }
}

/// Click Window (0x07). Only the header is decoded; the clicked item is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickWindow {
    pub window_id: u8,
    pub slot: i16,
    pub button: u8,
    pub action_number: i16,
    pub mode: i32,
}

impl Packet for ClickWindow {
    const ID: i32 = id::play_in::CLICK_WINDOW;
}

impl ProtoDecode for ClickWindow {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let window_id = get_u8(buf)?;
        let slot = get_i16(buf)?;
        let button = get_u8(buf)?;
        let action_number = get_i16(buf)?;
        let mode = VarInt::proto_decode(buf)?.0;
        Ok(Self {
            window_id,
            slot,
            button,
            action_number,
            mode,
        })
    }
}

/// Close Window (0x08).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseWindow {
    pub window_id: u8,
}

impl Packet for CloseWindow {
    const ID: i32 = id::play_in::CLOSE_WINDOW;
}

impl ProtoDecode for CloseWindow {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            window_id: get_u8(buf)?,
        })
    }
}

/// Plugin Message (0x09). The payload runs to the end of the packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMessage {
    pub channel: String,
    pub data: Vec<u8>,
}

impl Packet for PluginMessage {
    const ID: i32 = id::play_in::PLUGIN_MESSAGE;
}

impl ProtoDecode for PluginMessage {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let channel = codec::read_string(buf, MAX_CHANNEL_LEN)?;
        let rest = buf.remaining();
        let data = buf.copy_to_bytes(rest).to_vec();
        Ok(Self { channel, data })
    }
}

impl ProtoEncode for PluginMessage {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        codec::write_byte_array(buf, self.channel.as_bytes());
        buf.put_slice(&self.data);
    }
}

/// Keep Alive (0x0B), echoing the id of the server's keep-alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveIn {
    pub id: i64,
}

impl Packet for KeepAliveIn {
    const ID: i32 = id::play_in::KEEP_ALIVE;
}

impl ProtoDecode for KeepAliveIn {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        codec::ensure_remaining(buf, 8)?;
        Ok(Self { id: buf.get_i64() })
    }
}

impl ProtoEncode for KeepAliveIn {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.id);
    }
}

/// Player Position (0x0D).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPosition {
    pub x: f64,
    pub feet_y: f64,
    pub z: f64,
    pub on_ground: bool,
}

impl Packet for PlayerPosition {
    const ID: i32 = id::play_in::PLAYER_POSITION;
}

impl ProtoDecode for PlayerPosition {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: get_f64(buf)?,
            feet_y: get_f64(buf)?,
            z: get_f64(buf)?,
            on_ground: get_u8(buf)? != 0,
        })
    }
}

/// Player Position And Look (0x0E), serverbound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPositionAndLookIn {
    pub x: f64,
    pub feet_y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl Packet for PlayerPositionAndLookIn {
    const ID: i32 = id::play_in::PLAYER_POSITION_AND_LOOK;
}

impl ProtoDecode for PlayerPositionAndLookIn {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            x: get_f64(buf)?,
            feet_y: get_f64(buf)?,
            z: get_f64(buf)?,
            yaw: get_f32(buf)?,
            pitch: get_f32(buf)?,
            on_ground: get_u8(buf)? != 0,
        })
    }
}

impl ProtoEncode for PlayerPositionAndLookIn {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.feet_y);
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_u8(self.on_ground as u8);
    }
}

/// Player Look (0x0F).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerLook {
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl Packet for PlayerLook {
    const ID: i32 = id::play_in::PLAYER_LOOK;
}

impl ProtoDecode for PlayerLook {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            yaw: get_f32(buf)?,
            pitch: get_f32(buf)?,
            on_ground: get_u8(buf)? != 0,
        })
    }
}

/// Animation (0x1D): arm swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    /// 0 = main hand, 1 = off hand.
    pub hand: i32,
}

impl Packet for Animation {
    const ID: i32 = id::play_in::ANIMATION;
}

impl ProtoDecode for Animation {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            hand: VarInt::proto_decode(buf)?.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn client_settings_roundtrip() {
        let pkt = ClientSettings {
            locale: "fr_fr".into(),
            view_distance: 8,
            chat_mode: ChatMode::CommandsOnly,
            chat_colors: false,
            skin_parts: 0x3F,
            main_hand: MainHand::Left,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(ClientSettings::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }

    #[test]
    fn client_settings_locale_bound() {
        let pkt = ClientSettings {
            locale: "x".repeat(17),
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert!(ClientSettings::proto_decode(&mut buf.freeze()).is_err());
    }

    #[test]
    fn chat_message_bound() {
        let mut buf = BytesMut::new();
        ChatMessage {
            message: "m".repeat(MAX_CHAT_LEN + 1),
        }
        .proto_encode(&mut buf);
        assert!(ChatMessage::proto_decode(&mut buf.freeze()).is_err());
    }

    #[test]
    fn plugin_message_takes_rest() {
        let mut buf = BytesMut::new();
        PluginMessage {
            channel: "MC|Brand".into(),
            data: b"\x07vanilla".to_vec(),
        }
        .proto_encode(&mut buf);
        let decoded = PluginMessage::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.channel, "MC|Brand");
        assert_eq!(decoded.data.len(), 8);
    }

    #[test]
    fn position_and_look_roundtrip() {
        let pkt = PlayerPositionAndLookIn {
            x: 1.5,
            feet_y: 80.0,
            z: -3.25,
            yaw: 90.0,
            pitch: -10.0,
            on_ground: true,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(buf.len(), 33);
        assert_eq!(PlayerPositionAndLookIn::proto_decode(&mut buf.freeze()).unwrap(), pkt);
    }

    #[test]
    fn truncated_position_fails() {
        let data = [0u8; 20];
        assert!(PlayerPosition::proto_decode(&mut &data[..]).is_err());
    }

    #[test]
    fn client_status_actions() {
        let data = [0x01u8];
        let status = ClientStatus::proto_decode(&mut &data[..]).unwrap();
        assert_eq!(status.action, ClientStatusAction::RequestStats);
    }
}
