//! Packet definitions for Java Edition 1.12.2.

pub mod handshake;
pub mod login;
pub mod play_in;
pub mod play_out;

pub use handshake::{Handshake, NextState, Ping, Pong, StatusResponsePacket};
pub use login::{EncryptionRequest, EncryptionResponse, LoginDisconnect, LoginStart, LoginSuccess};
pub use play_in::{
    Animation, ChatMessage, ClickWindow, ClientSettings, ClientStatus, CloseWindow, KeepAliveIn,
    PlayerLook, PlayerPosition, PlayerPositionAndLookIn, PluginMessage, TeleportConfirm,
};
pub use play_out::{
    ChatMessageOut, JoinGame, KeepAliveOut, Kick, PlayerAbilities, PlayerListEntry,
    PlayerListItem, PlayerPositionAndLook,
};

/// Game version this server speaks.
pub const VERSION_NAME: &str = "1.12.2";
/// Protocol number sent in the handshake for [`VERSION_NAME`].
pub const PROTOCOL_VERSION: i32 = 340;

/// Packet ID constants, grouped by connection state.
pub mod id {
    pub mod handshake {
        pub const HANDSHAKE: i32 = 0x00;
        pub const PING: i32 = 0x01;
        pub const STATUS_RESPONSE: i32 = 0x00;
        pub const PONG: i32 = 0x01;
    }

    pub mod login {
        pub const LOGIN_START: i32 = 0x00;
        pub const ENCRYPTION_RESPONSE: i32 = 0x01;
        pub const DISCONNECT: i32 = 0x00;
        pub const ENCRYPTION_REQUEST: i32 = 0x01;
        pub const LOGIN_SUCCESS: i32 = 0x02;
    }

    /// Serverbound play packets.
    pub mod play_in {
        pub const TELEPORT_CONFIRM: i32 = 0x00;
        pub const CHAT_MESSAGE: i32 = 0x02;
        pub const CLIENT_STATUS: i32 = 0x03;
        pub const CLIENT_SETTINGS: i32 = 0x04;
        pub const CLICK_WINDOW: i32 = 0x07;
        pub const CLOSE_WINDOW: i32 = 0x08;
        pub const PLUGIN_MESSAGE: i32 = 0x09;
        pub const KEEP_ALIVE: i32 = 0x0B;
        pub const PLAYER_POSITION: i32 = 0x0D;
        pub const PLAYER_POSITION_AND_LOOK: i32 = 0x0E;
        pub const PLAYER_LOOK: i32 = 0x0F;
        pub const ANIMATION: i32 = 0x1D;
    }

    /// Clientbound play packets.
    pub mod play_out {
        pub const CHAT_MESSAGE: i32 = 0x0F;
        pub const DISCONNECT: i32 = 0x1A;
        pub const KEEP_ALIVE: i32 = 0x1F;
        pub const JOIN_GAME: i32 = 0x23;
        pub const PLAYER_ABILITIES: i32 = 0x2C;
        pub const PLAYER_LIST_ITEM: i32 = 0x2E;
        pub const PLAYER_POSITION_AND_LOOK: i32 = 0x2F;
    }
}
