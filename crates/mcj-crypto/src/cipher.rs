//! AES-128-CFB8 stream cipher halves.
//!
//! Key and IV are both the 16-byte shared secret. Each direction keeps its
//! own state, carried across packets, so the two halves are owned by the
//! connection's reader and writer respectively.

use aes::Aes128;
use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cfb8::{Decryptor, Encryptor};

use crate::CryptoError;

/// Shared secret length (AES-128 key).
pub const SHARED_SECRET_LEN: usize = 16;

fn check_secret(secret: &[u8]) -> Result<(), CryptoError> {
    if secret.len() != SHARED_SECRET_LEN {
        return Err(CryptoError::InvalidSecretLength {
            expected: SHARED_SECRET_LEN,
            actual: secret.len(),
        });
    }
    Ok(())
}

/// Outbound half.
pub struct CipherEncryptor {
    cipher: Encryptor<Aes128>,
}

impl CipherEncryptor {
    pub fn new(shared_secret: &[u8]) -> Result<Self, CryptoError> {
        check_secret(shared_secret)?;
        let key = GenericArray::from_slice(shared_secret);
        Ok(Self {
            cipher: Encryptor::<Aes128>::new(key, key),
        })
    }

    /// Encrypt `data` in place, continuing the stream.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.cipher.encrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }
}

/// Inbound half.
pub struct CipherDecryptor {
    cipher: Decryptor<Aes128>,
}

impl CipherDecryptor {
    pub fn new(shared_secret: &[u8]) -> Result<Self, CryptoError> {
        check_secret(shared_secret)?;
        let key = GenericArray::from_slice(shared_secret);
        Ok(Self {
            cipher: Decryptor::<Aes128>::new(key, key),
        })
    }

    /// Decrypt `data` in place, continuing the stream.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.cipher.decrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }
}

/// Build both halves from one shared secret.
pub fn cipher_pair(shared_secret: &[u8]) -> Result<(CipherEncryptor, CipherDecryptor), CryptoError> {
    Ok((
        CipherEncryptor::new(shared_secret)?,
        CipherDecryptor::new(shared_secret)?,
    ))
}
