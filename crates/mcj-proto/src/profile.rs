//! Player profiles as returned by the session service.

use serde::{Deserialize, Serialize};

use crate::types::Uuid;

/// A signed profile property, e.g. `textures`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Verified (or locally derived) player identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl GameProfile {
    /// Profile for a server that skips the session service.
    pub fn offline(name: &str) -> Self {
        Self {
            id: Uuid::offline_player(name),
            name: name.to_string(),
            properties: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_server_reply() {
        let json = r#"{
            "id": "069a79f444e94726a5befca90e38aaf5",
            "name": "Notch",
            "properties": [
                {"name": "textures", "value": "eyJ0", "signature": "c2ln"}
            ]
        }"#;
        let profile: GameProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.name, "Notch");
        assert_eq!(profile.id.to_string(), "069a79f4-44e9-4726-a5be-fca90e38aaf5");
        assert_eq!(profile.properties.len(), 1);
        assert_eq!(profile.properties[0].signature.as_deref(), Some("c2ln"));
    }

    #[test]
    fn properties_default_to_empty() {
        let json = r#"{"id": "069a79f444e94726a5befca90e38aaf5", "name": "Notch"}"#;
        let profile: GameProfile = serde_json::from_str(json).unwrap();
        assert!(profile.properties.is_empty());
    }

    #[test]
    fn offline_profile() {
        let profile = GameProfile::offline("Alice");
        assert_eq!(profile.id, Uuid::offline_player("Alice"));
        assert_eq!(profile.name, "Alice");
        assert!(profile.properties.is_empty());
    }
}
