//! Ban list persisted as `banned-players.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use mcj_proto::Uuid;

pub const BANNED_PLAYERS_FILE: &str = "banned-players.json";
/// Reason given to a banned player when none was recorded.
pub const DEFAULT_BAN_REASON: &str = "You are banned from this server.";

/// A ban entry. The reason is omitted from the file when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// In-memory ban list bound to the file it was loaded from.
#[derive(Debug)]
pub struct BanList {
    path: PathBuf,
    entries: Vec<BanEntry>,
}

impl BanList {
    /// Load the list at `path`. A missing file gives an empty list; a malformed
    /// one is logged and also gives an empty list.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = if !path.exists() {
            Vec::new()
        } else {
            match fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<Vec<BanEntry>>(&contents) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("Failed to parse {}: {e}", path.display());
                        Vec::new()
                    }
                },
                Err(e) => {
                    warn!("Failed to read {}: {e}", path.display());
                    Vec::new()
                }
            }
        };
        Self { path, entries }
    }

    /// Write the list back to its file.
    pub fn save(&self) {
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    warn!("Failed to write {}: {e}", self.path.display());
                }
            }
            Err(e) => warn!("Failed to serialize {}: {e}", self.path.display()),
        }
    }

    /// Ban `uuid`, replacing the reason if already banned.
    pub fn ban(&mut self, uuid: Uuid, reason: impl Into<String>) {
        let reason = reason.into();
        match self.entries.iter_mut().find(|e| e.uuid == uuid) {
            Some(entry) => entry.reason = reason,
            None => self.entries.push(BanEntry { uuid, reason }),
        }
    }

    /// Lift a ban. Returns whether `uuid` was banned.
    pub fn pardon(&mut self, uuid: &Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.uuid != uuid);
        self.entries.len() != before
    }

    /// Kick message for a banned id, or `None` when not banned.
    pub fn reason_for(&self, uuid: &Uuid) -> Option<String> {
        self.entries.iter().find(|e| &e.uuid == uuid).map(|e| {
            if e.reason.is_empty() {
                DEFAULT_BAN_REASON.to_string()
            } else {
                e.reason.clone()
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
