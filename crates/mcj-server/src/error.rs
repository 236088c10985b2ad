//! Server-side error types.

use thiserror::Error;

use mcj_crypto::CryptoError;
use mcj_proto::ProtoError;

/// Failure that ends one connection. Never escapes to the server.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtoError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Failure talking to the session service.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session server request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session server did not confirm the join (status {0})")]
    NotVerified(u16),

    #[error("session server returned profile for {got}, expected {expected}")]
    NameMismatch { expected: String, got: String },
}

/// Failure loading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
