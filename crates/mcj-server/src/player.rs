//! Per-player state, owned by its connection once login completes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use mcj_proto::packets::play_in::ClientSettings;
use mcj_proto::packets::PlayerListEntry;
use mcj_proto::profile::GameProfile;
use mcj_proto::types::Location;

/// Where new players appear.
pub const SPAWN: Location = Location {
    x: 0.0,
    y: 80.0,
    z: 0.0,
    yaw: 90.0,
    pitch: 0.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum GameMode {
    #[default]
    Survival = 0,
    Creative = 1,
    Adventure = 2,
    Spectator = 3,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub profile: GameProfile,
    pub entity_id: i32,
    pub settings: ClientSettings,
    pub gamemode: GameMode,
    pub location: Location,
    /// Explicit grants and denials. Absent means denied.
    permissions: HashMap<String, bool>,
}

impl Player {
    pub fn new(profile: GameProfile, entity_id: i32, gamemode: GameMode) -> Self {
        Self {
            profile,
            entity_id,
            settings: ClientSettings::default(),
            gamemode,
            location: SPAWN,
            permissions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.get(permission).copied().unwrap_or(false)
    }

    pub fn set_permission(&mut self, permission: impl Into<String>, granted: bool) {
        self.permissions.insert(permission.into(), granted);
    }

    /// This player as a tab-list row.
    pub fn list_entry(&self) -> PlayerListEntry {
        PlayerListEntry {
            uuid: self.profile.id,
            name: self.profile.name.clone(),
            properties: self.profile.properties.clone(),
            gamemode: self.gamemode as i32,
            ping: 0,
            display_name: None,
        }
    }
}
