//! Upstream request signature key (`algorithm:secret`).

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ErrorKind, ValidationErrors};

const SETTING: &str = "signature-key";

/// Digest algorithms accepted by the request signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// MD5.
    Md5,
    /// SHA-1.
    Sha1,
    /// SHA-224.
    Sha224,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Lowercase digest name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Look up a digest by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Algorithm and shared secret used to sign proxied requests.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureSpec {
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Shared secret.
    pub secret: String,
}

macro_rules! hmac_with {
    ($digest:ty, $key:expr, $payload:expr) => {{
        let mut mac = <Hmac<$digest> as KeyInit>::new_from_slice($key).ok()?;
        mac.update($payload);
        mac.finalize().into_bytes().to_vec()
    }};
}

impl SignatureSpec {
    /// HMAC of `payload` under the shared secret.
    ///
    /// Only the SHA-2 family is computed here; `md5` and `sha1` specs are
    /// carried for the external signer and return `None`.
    pub fn sign(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let key = self.secret.as_bytes();
        let digest = match self.algorithm {
            HashAlgorithm::Md5 | HashAlgorithm::Sha1 => return None,
            HashAlgorithm::Sha224 => hmac_with!(Sha224, key, payload),
            HashAlgorithm::Sha256 => hmac_with!(Sha256, key, payload),
            HashAlgorithm::Sha384 => hmac_with!(Sha384, key, payload),
            HashAlgorithm::Sha512 => hmac_with!(Sha512, key, payload),
        };
        Some(digest)
    }
}

impl FromStr for SignatureSpec {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let components: Vec<&str> = spec.split(':').collect();
        let [algorithm, secret] = components.as_slice() else {
            return Err(ConfigError::malformed(
                SETTING,
                format!("invalid signature hash:key spec: {}", spec),
            ));
        };

        let algorithm = HashAlgorithm::from_name(algorithm).ok_or_else(|| {
            ConfigError::new(
                SETTING,
                ErrorKind::Unsupported,
                format!("unsupported signature hash algorithm: {}", spec),
            )
        })?;

        Ok(Self {
            algorithm,
            secret: (*secret).to_string(),
        })
    }
}

impl fmt::Debug for SignatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureSpec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Parse the `signature-key` setting. Empty means request signing is off.
pub fn parse_signature_key(value: &str, errors: &mut ValidationErrors) -> Option<SignatureSpec> {
    if value.is_empty() {
        return None;
    }
    value.parse().map_err(|err| errors.push(err)).ok()
}
