//! Server list ping payload.

use serde::{Deserialize, Serialize};

use crate::chat::ChatComponent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPlayers {
    pub max: u32,
    pub online: u32,
}

/// JSON body of the status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: StatusVersion,
    pub players: StatusPlayers,
    pub description: ChatComponent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl StatusResponse {
    pub fn new(
        version_name: &str,
        protocol: i32,
        max: u32,
        online: u32,
        motd: &str,
        favicon: Option<String>,
    ) -> Self {
        Self {
            version: StatusVersion {
                name: version_name.to_string(),
                protocol,
            },
            players: StatusPlayers { max, online },
            description: ChatComponent::text(motd),
            favicon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favicon_omitted_when_unset() {
        let status = StatusResponse::new("1.12.2", 340, 20, 3, "hello", None);
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"version":{"name":"1.12.2","protocol":340},"players":{"max":20,"online":3},"description":{"text":"hello"}}"#
        );
    }

    #[test]
    fn favicon_included_when_set() {
        let status = StatusResponse::new(
            "1.12.2",
            340,
            20,
            0,
            "m",
            Some("data:image/png;base64,AAAA".into()),
        );
        let value: serde_json::Value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["favicon"], "data:image/png;base64,AAAA");
        assert_eq!(value["description"]["text"], "m");
    }
}
