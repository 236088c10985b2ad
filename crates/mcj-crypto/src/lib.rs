//! Cryptography for the login handshake: RSA key exchange, AES-128-CFB8
//! stream cipher, session-server digest.

pub mod cipher;
pub mod digest;
pub mod keypair;

pub use cipher::{CipherDecryptor, CipherEncryptor};
pub use digest::server_hash;
pub use keypair::{generate_verify_token, ServerKeyPair, VERIFY_TOKEN_LEN};

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("public key encoding error: {0}")]
    KeyEncoding(String),

    #[error("shared secret must be {expected} bytes, got {actual}")]
    InvalidSecretLength { expected: usize, actual: usize },
}
