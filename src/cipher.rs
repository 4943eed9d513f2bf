//! Symmetric cipher for session cookie values.
//!
//! The key size follows the cookie secret: 16, 24 or 32 bytes select
//! AES-128-GCM, AES-192-GCM or AES-256-GCM. Values are sealed as
//! `base64url(nonce || ciphertext)` with a fresh 96-bit nonce per call.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::fmt;
use thiserror::Error;

type Aes192Gcm = AesGcm<Aes192, U12>;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Key lengths accepted for the cookie cipher.
pub const VALID_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

/// Cipher failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// The key is not 16, 24 or 32 bytes.
    #[error("invalid key length {0}, expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),

    /// Sealing failed.
    #[error("encryption failed")]
    Encrypt,

    /// The value is not a sealed value for this key.
    #[error("decryption failed")]
    Decrypt,
}

#[derive(Clone)]
enum Inner {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM cipher keyed by the cookie secret.
#[derive(Clone)]
pub struct SymmetricCipher {
    inner: Inner,
}

impl SymmetricCipher {
    /// Create a cipher from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let invalid = |_| CipherError::InvalidKeyLength(key.len());
        let inner = match key.len() {
            16 => Inner::Aes128(Aes128Gcm::new_from_slice(key).map_err(invalid)?),
            24 => Inner::Aes192(Aes192Gcm::new_from_slice(key).map_err(invalid)?),
            32 => Inner::Aes256(Aes256Gcm::new_from_slice(key).map_err(invalid)?),
            other => return Err(CipherError::InvalidKeyLength(other)),
        };
        Ok(Self { inner })
    }

    /// Key size in bits.
    pub fn key_bits(&self) -> usize {
        match self.inner {
            Inner::Aes128(_) => 128,
            Inner::Aes192(_) => 192,
            Inner::Aes256(_) => 256,
        }
    }

    /// Seal `plaintext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let nonce_ref = Nonce::from_slice(&nonce);

        let ciphertext = match &self.inner {
            Inner::Aes128(c) => c.encrypt(nonce_ref, plaintext),
            Inner::Aes192(c) => c.encrypt(nonce_ref, plaintext),
            Inner::Aes256(c) => c.encrypt(nonce_ref, plaintext),
        }
        .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Open a value produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, sealed: &str) -> Result<Vec<u8>, CipherError> {
        let raw = URL_SAFE_NO_PAD.decode(sealed).map_err(|_| CipherError::Decrypt)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Decrypt);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        match &self.inner {
            Inner::Aes128(c) => c.decrypt(nonce, ciphertext),
            Inner::Aes192(c) => c.decrypt(nonce, ciphertext),
            Inner::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CipherError::Decrypt)
    }
}

impl fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricCipher")
            .field("key_bits", &self.key_bits())
            .finish_non_exhaustive()
    }
}
