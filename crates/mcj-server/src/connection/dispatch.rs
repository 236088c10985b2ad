//! Per-state packet id -> handler tables.

use std::sync::Arc;

use mcj_proto::packets::id;
use mcj_proto::RawPacket;

use super::{handshake, login, play, Connection, ConnectionReader, ConnectionState};
use crate::error::ConnectionError;
use crate::server::ServerState;

/// What a handler may touch: its own connection, the server, and the
/// connection's inbound half (needed to switch on decryption).
pub(crate) struct HandlerContext<'a> {
    pub conn: &'a Arc<Connection>,
    pub server: &'a Arc<ServerState>,
    pub reader: &'a mut ConnectionReader,
}

/// The dispatch table installed for a connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerTable {
    Handshake,
    Login,
    Play,
}

impl HandlerTable {
    pub fn for_state(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Handshake => Self::Handshake,
            ConnectionState::Login => Self::Login,
            ConnectionState::Play => Self::Play,
        }
    }

    /// Handler for `packet_id`, or `None` if this state does not accept it.
    pub fn lookup(self, packet_id: i32) -> Option<PacketHandler> {
        use PacketHandler::*;
        let handler = match self {
            Self::Handshake => match packet_id {
                id::handshake::HANDSHAKE => Handshake,
                id::handshake::PING => Ping,
                _ => return None,
            },
            Self::Login => match packet_id {
                id::login::LOGIN_START => LoginStart,
                id::login::ENCRYPTION_RESPONSE => EncryptionResponse,
                _ => return None,
            },
            Self::Play => match packet_id {
                id::play_in::TELEPORT_CONFIRM => TeleportConfirm,
                id::play_in::CHAT_MESSAGE => ChatMessage,
                id::play_in::CLIENT_STATUS => ClientStatus,
                id::play_in::CLIENT_SETTINGS => ClientSettings,
                id::play_in::CLICK_WINDOW => ClickWindow,
                id::play_in::CLOSE_WINDOW => CloseWindow,
                id::play_in::PLUGIN_MESSAGE => PluginMessage,
                id::play_in::KEEP_ALIVE => KeepAlive,
                id::play_in::PLAYER_POSITION => PlayerPosition,
                id::play_in::PLAYER_POSITION_AND_LOOK => PlayerPositionAndLook,
                id::play_in::PLAYER_LOOK => PlayerLook,
                id::play_in::ANIMATION => Animation,
                _ => return None,
            },
        };
        Some(handler)
    }
}

/// Every inbound packet the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHandler {
    Handshake,
    Ping,
    LoginStart,
    EncryptionResponse,
    TeleportConfirm,
    ChatMessage,
    ClientStatus,
    ClientSettings,
    ClickWindow,
    CloseWindow,
    PluginMessage,
    KeepAlive,
    PlayerPosition,
    PlayerPositionAndLook,
    PlayerLook,
    Animation,
}

impl PacketHandler {
    pub(crate) async fn invoke(
        self,
        ctx: &mut HandlerContext<'_>,
        packet: &mut RawPacket,
    ) -> Result<(), ConnectionError> {
        match self {
            Self::Handshake => handshake::handshake(ctx, packet).await,
            Self::Ping => handshake::ping(ctx, packet).await,
            Self::LoginStart => login::login_start(ctx, packet).await,
            Self::EncryptionResponse => login::encryption_response(ctx, packet).await,
            Self::TeleportConfirm => play::teleport_confirm(ctx, packet),
            Self::ChatMessage => play::chat_message(ctx, packet).await,
            Self::ClientStatus => play::client_status(ctx, packet),
            Self::ClientSettings => play::client_settings(ctx, packet),
            Self::ClickWindow => play::click_window(ctx, packet),
            Self::CloseWindow => play::close_window(ctx, packet),
            Self::PluginMessage => play::plugin_message(ctx, packet),
            Self::KeepAlive => play::keep_alive(ctx, packet),
            Self::PlayerPosition => play::player_position(ctx, packet),
            Self::PlayerPositionAndLook => play::player_position_and_look(ctx, packet),
            Self::PlayerLook => play::player_look(ctx, packet),
            Self::Animation => play::animation(ctx, packet),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_table_only_accepts_handshake_ids() {
        let table = HandlerTable::Handshake;
        assert_eq!(table.lookup(0x00), Some(PacketHandler::Handshake));
        assert_eq!(table.lookup(0x01), Some(PacketHandler::Ping));
        assert_eq!(table.lookup(id::play_in::KEEP_ALIVE), None);
        assert_eq!(table.lookup(id::play_in::CHAT_MESSAGE), None);
    }

    #[test]
    fn same_id_means_different_things_per_state() {
        assert_eq!(HandlerTable::Handshake.lookup(0x00), Some(PacketHandler::Handshake));
        assert_eq!(HandlerTable::Login.lookup(0x00), Some(PacketHandler::LoginStart));
        assert_eq!(HandlerTable::Play.lookup(0x00), Some(PacketHandler::TeleportConfirm));
    }

    #[test]
    fn play_table_covers_handled_packets() {
        let table = HandlerTable::Play;
        for packet_id in [0x00, 0x02, 0x03, 0x04, 0x07, 0x08, 0x09, 0x0B, 0x0D, 0x0E, 0x0F, 0x1D] {
            assert!(table.lookup(packet_id).is_some(), "0x{packet_id:02X}");
        }
        assert_eq!(table.lookup(0x05), None);
        assert_eq!(table.lookup(-1), None);
    }

    #[test]
    fn table_follows_state() {
        assert_eq!(HandlerTable::for_state(ConnectionState::Login), HandlerTable::Login);
        assert_eq!(HandlerTable::for_state(ConnectionState::Play), HandlerTable::Play);
    }
}
