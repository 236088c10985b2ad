//! Session-service authentication for online-mode logins.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use mcj_crypto::server_hash;
use mcj_proto::profile::GameProfile;

use crate::error::AuthError;

pub const DEFAULT_SESSION_SERVER: &str = "https://sessionserver.mojang.com";

/// Resolves a verified profile for a client that finished the encryption
/// handshake.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn authenticate(
        &self,
        username: &str,
        shared_secret: &[u8],
        public_key: &[u8],
    ) -> Result<GameProfile, AuthError>;
}

/// [`AuthGateway`] backed by the `hasJoined` HTTP endpoint.
pub struct SessionServer {
    client: reqwest::Client,
    base_url: String,
}

impl SessionServer {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_SESSION_SERVER)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for SessionServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthGateway for SessionServer {
    async fn authenticate(
        &self,
        username: &str,
        shared_secret: &[u8],
        public_key: &[u8],
    ) -> Result<GameProfile, AuthError> {
        let hash = server_hash("", shared_secret, public_key);
        let url = format!("{}/session/minecraft/hasJoined", self.base_url);
        debug!("Verifying {username} against {url}");

        let response = self
            .client
            .get(&url)
            .query(&[("username", username), ("serverId", hash.as_str())])
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(AuthError::NotVerified(response.status().as_u16()));
        }
        let profile: GameProfile = response.json().await?;
        if !profile.name.eq_ignore_ascii_case(username) {
            return Err(AuthError::NameMismatch {
                expected: username.to_string(),
                got: profile.name,
            });
        }
        Ok(profile)
    }
}
