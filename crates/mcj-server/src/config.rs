//! `server.toml` loading, with defaults written out on first start.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::player::GameMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerSection {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_motd")]
    pub motd: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default = "default_online_mode")]
    pub online_mode: bool,
    #[serde(default = "default_view_distance")]
    pub view_distance: u8,
    /// Game mode new players join in.
    #[serde(default)]
    pub gamemode: GameMode,
}

fn default_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    25565
}

fn default_motd() -> String {
    "A Minecraft Server".into()
}

fn default_max_players() -> u32 {
    20
}

fn default_online_mode() -> bool {
    true
}

fn default_view_distance() -> u8 {
    10
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            motd: default_motd(),
            max_players: default_max_players(),
            online_mode: default_online_mode(),
            view_distance: default_view_distance(),
            gamemode: GameMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl ServerConfig {
    /// Read the config at `path`, creating it with defaults when absent.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        if !path.exists() {
            let config = Self::default();
            let contents = toml::to_string_pretty(&config)?;
            fs::write(path, contents).map_err(|source| ConfigError::Io {
                path: shown.clone(),
                source,
            })?;
            info!("Created default {shown}");
            return Ok(config);
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: shown,
            source,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }
}

/// Load `server-icon.png` from `path` as a data URL for the status response.
/// A missing icon is not an error.
pub fn load_favicon<P: AsRef<Path>>(path: P) -> Option<String> {
    let path = path.as_ref();
    if !path.exists() {
        return None;
    }
    match fs::read(path) {
        Ok(bytes) => {
            info!("Loaded server icon from {}", path.display());
            Some(format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
        }
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            [server]
            address = "127.0.0.1"
            port = 25570
            motd = "Test Server"
            max-players = 5
            online-mode = false
            view-distance = 6
            gamemode = "creative"

            [logging]
            level = "debug"
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.address, "127.0.0.1");
        assert_eq!(config.server.port, 25570);
        assert_eq!(config.server.motd, "Test Server");
        assert_eq!(config.server.max_players, 5);
        assert!(!config.server.online_mode);
        assert_eq!(config.server.view_distance, 6);
        assert_eq!(config.server.gamemode, GameMode::Creative);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.bind_address(), "127.0.0.1:25570");
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config: ServerConfig = toml::from_str("[server]\nport = 1234\n").unwrap();
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.server.address, "0.0.0.0");
        assert_eq!(config.server.max_players, 20);
        assert!(config.server.online_mode);
        assert_eq!(config.server.gamemode, GameMode::Survival);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn creates_file_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        let config = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config.server.port, 25565);
        assert!(path.exists());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("max-players = 20"));
        assert!(written.contains("gamemode = \"survival\""));
        let reloaded = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(reloaded.server.motd, config.server.motd);
    }

    #[test]
    fn unknown_gamemode_is_rejected() {
        assert!(toml::from_str::<ServerConfig>("[server]\ngamemode = \"hardcore\"\n").is_err());
        let config: ServerConfig = toml::from_str("[server]\ngamemode = \"spectator\"\n").unwrap();
        assert_eq!(config.server.gamemode, GameMode::Spectator);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();
        assert!(matches!(
            ServerConfig::load_or_create(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn favicon_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server-icon.png");
        assert!(load_favicon(&path).is_none());
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        assert_eq!(
            load_favicon(&path).as_deref(),
            Some("data:image/png;base64,iVBORw==")
        );
    }
}
