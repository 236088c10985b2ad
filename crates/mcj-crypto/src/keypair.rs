//! RSA-1024 key pair used to receive the client's shared secret.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::CryptoError;

/// Key size the vanilla client expects.
pub const KEY_BITS: usize = 1024;
/// Length of the verify token sent in the encryption request.
pub const VERIFY_TOKEN_LEN: usize = 4;

struct Inner {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
}

/// Server key pair, generated once per process. Cheap to clone.
#[derive(Clone)]
pub struct ServerKeyPair {
    inner: Arc<Inner>,
}

impl ServerKeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, KEY_BITS)?;
        Self::from_private_key(private)
    }

    pub fn from_private_key(private: RsaPrivateKey) -> Result<Self, CryptoError> {
        let public_der = RsaPublicKey::from(&private)
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self {
            inner: Arc::new(Inner {
                private,
                public_der,
            }),
        })
    }

    /// Public key as SubjectPublicKeyInfo DER, as sent in the encryption request.
    pub fn public_key_der(&self) -> &[u8] {
        &self.inner.public_der
    }

    /// Decrypt a PKCS#1 v1.5 block produced with our public key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.inner.private.decrypt(Pkcs1v15Encrypt, ciphertext)?)
    }
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("public_der_len", &self.inner.public_der.len())
            .finish_non_exhaustive()
    }
}

/// Fresh random verify token.
pub fn generate_verify_token() -> [u8; VERIFY_TOKEN_LEN] {
    let mut token = [0u8; VERIFY_TOKEN_LEN];
    OsRng.fill_bytes(&mut token);
    token
}
