//! Chat components and legacy formatting codes.

use serde::{Deserialize, Serialize};

/// Where a clientbound chat message is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ChatPosition {
    Chat = 0,
    System = 1,
    ActionBar = 2,
}

/// A plain text chat component, serialized as `{"text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatComponent {
    pub text: String,
}

impl ChatComponent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn to_json(&self) -> String {
        // A single-string struct cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"text":""}"#))
    }
}

/// Section-sign formatting codes understood by the client.
pub mod code {
    pub const OBFUSCATED: &str = "§k";
    pub const BOLD: &str = "§l";
    pub const STRIKETHROUGH: &str = "§m";
    pub const UNDERLINE: &str = "§n";
    pub const ITALIC: &str = "§o";
    pub const RESET: &str = "§r";

    pub const BLACK: &str = "§0";
    pub const DARK_BLUE: &str = "§1";
    pub const DARK_GREEN: &str = "§2";
    pub const DARK_AQUA: &str = "§3";
    pub const DARK_RED: &str = "§4";
    pub const DARK_PURPLE: &str = "§5";
    pub const GOLD: &str = "§6";
    pub const GRAY: &str = "§7";
    pub const DARK_GRAY: &str = "§8";
    pub const BLUE: &str = "§9";
    pub const GREEN: &str = "§a";
    pub const AQUA: &str = "§b";
    pub const RED: &str = "§c";
    pub const LIGHT_PURPLE: &str = "§d";
    pub const YELLOW: &str = "§e";
    pub const WHITE: &str = "§f";
}

/// Remove every `§x` formatting code, e.g. before logging a message.
pub fn strip_codes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
