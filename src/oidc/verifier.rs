//! Token verifiers backed by a remote key set.
//!
//! A [`TokenVerifier`] checks a signed token's signature, audience, issuer and
//! expiry. It is built either from a discovery document or from an explicit
//! JWKS URL; both lineages behave the same once built. Keys are fetched lazily
//! on first use and cached, refreshing when an unknown key id shows up.

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use super::discovery::{parse_absolute, OidcDiscovery};
use crate::error::DiscoveryError;

/// Default key-set cache TTL.
const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(3600);

/// Clock skew tolerance for `exp`/`nbf` checks.
const DEFAULT_LEEWAY_SECONDS: u64 = 60;

/// How a verifier was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierSource {
    /// Built from a fetched discovery document.
    Discovery,
    /// Built from an issuer URI and an explicit JWKS URL.
    Explicit,
}

/// Error returned by [`TokenVerifier::verify`].
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token header could not be decoded.
    #[error("invalid token header: {0}")]
    InvalidHeader(String),

    /// The token is signed with an algorithm this verifier does not accept.
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    /// No key in the key set matches the token.
    #[error("unknown key ID: {0}")]
    UnknownKey(String),

    /// The key set could not be fetched.
    #[error("key set unavailable: {0}")]
    KeySet(#[from] DiscoveryError),

    /// Signature or claim validation failed.
    #[error("{0}")]
    Rejected(&'static str),
}

/// Cached JWKS keys.
struct CachedJwks {
    keys: KeyEntries,
    fetched_at: Instant,
    ttl: Duration,
}

impl fmt::Debug for CachedJwks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedJwks")
            .field("keys_count", &self.keys.len())
            .field("fetched_at", &self.fetched_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CachedJwks {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > self.ttl
    }
}

/// A verification key set fetched from a JWKS endpoint.
///
/// Clones share the same cache.
#[derive(Clone)]
pub struct RemoteKeySet {
    jwks_uri: Url,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    ttl: Duration,
}

impl fmt::Debug for RemoteKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKeySet")
            .field("jwks_uri", &self.jwks_uri.as_str())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl RemoteKeySet {
    /// Create a key set for `jwks_uri`. No request is made until first use.
    pub fn new(jwks_uri: &str, http_client: reqwest::Client) -> Result<Self, DiscoveryError> {
        Ok(Self {
            jwks_uri: parse_absolute(jwks_uri)?,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            ttl: DEFAULT_JWKS_TTL,
        })
    }

    /// The JWKS endpoint.
    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Look up a key by id, refreshing the set once on a miss.
    async fn key(&self, kid: Option<&str>) -> Result<DecodingKey, VerifyError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| !c.is_expired()) {
                if let Some(key) = cached.keys.select(kid) {
                    return Ok(key);
                }
            }
        }

        self.refresh().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.select(kid))
            .ok_or_else(|| VerifyError::UnknownKey(kid.unwrap_or("<none>").to_string()))
    }

    /// Fetch and cache the key set.
    async fn refresh(&self) -> Result<(), DiscoveryError> {
        let url = self.jwks_uri.to_string();
        tracing::debug!(jwks_uri = %url, "Fetching JWKS");

        let response = self
            .http_client
            .get(self.jwks_uri.clone())
            .send()
            .await
            .map_err(|e| DiscoveryError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| DiscoveryError::Parse {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let keys = KeyEntries::from_jwks(jwks.keys);

        if keys.is_empty() {
            return Err(DiscoveryError::Parse {
                url,
                reason: "no usable keys in key set".to_string(),
            });
        }

        tracing::info!(jwks_uri = %url, keys_count = keys.len(), "Cached JWKS keys");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
            ttl: self.ttl,
        });
        Ok(())
    }
}

/// Usable keys of one key set.
///
/// Keys without a `kid` are kept apart; they only match a token that names no
/// key, and only when they are the sole key in the set.
#[derive(Default)]
struct KeyEntries {
    by_kid: HashMap<String, DecodingKey>,
    anonymous: Vec<DecodingKey>,
}

impl KeyEntries {
    fn from_jwks(jwks: Vec<JwkKey>) -> Self {
        let mut entries = Self::default();
        for key in jwks {
            if key.kty != "RSA" {
                continue;
            }
            let (Some(n), Some(e)) = (&key.n, &key.e) else {
                continue;
            };
            match DecodingKey::from_rsa_components(n, e) {
                Ok(decoding_key) => match key.kid {
                    Some(kid) => {
                        entries.by_kid.insert(kid, decoding_key);
                    },
                    None => entries.anonymous.push(decoding_key),
                },
                Err(err) => {
                    tracing::warn!(kid = ?key.kid, error = %err, "Failed to parse JWK");
                },
            }
        }
        entries
    }

    fn len(&self) -> usize {
        self.by_kid.len() + self.anonymous.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick the key named by `kid`, or the only key when the token names none.
    fn select(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self.by_kid.get(kid).cloned(),
            None if self.len() == 1 => self
                .by_kid
                .values()
                .chain(self.anonymous.iter())
                .next()
                .cloned(),
            None => None,
        }
    }
}

/// Claims of a token that passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// `sub` claim.
    pub subject: String,
    /// All claims.
    pub claims: serde_json::Value,
    /// `exp` claim (Unix epoch seconds).
    pub expires_at: Option<u64>,
}

impl VerifiedToken {
    /// A string claim by name.
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(|v| v.as_str())
    }

    /// `email` claim.
    pub fn email(&self) -> Option<&str> {
        self.claim_str("email")
    }

    /// `email_verified` claim, `false` when absent.
    pub fn email_verified(&self) -> bool {
        self.claims
            .get("email_verified")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Validates signed tokens for one issuer and audience.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    audience: String,
    skip_issuer_check: bool,
    algorithms: Vec<Algorithm>,
    leeway_seconds: u64,
    source: VerifierSource,
    key_set: RemoteKeySet,
}

impl TokenVerifier {
    /// Build a verifier from a discovery document.
    pub fn from_discovery(
        doc: &OidcDiscovery,
        audience: impl Into<String>,
        skip_issuer_check: bool,
        http_client: reqwest::Client,
    ) -> Result<Self, DiscoveryError> {
        let key_set = RemoteKeySet::new(&doc.jwks_uri, http_client)?;
        Ok(Self {
            issuer: doc.issuer.clone(),
            audience: audience.into(),
            skip_issuer_check,
            algorithms: supported_algorithms(&doc.id_token_signing_alg_values_supported),
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
            source: VerifierSource::Discovery,
            key_set,
        })
    }

    /// Build a verifier from an issuer URI and a key set.
    pub fn from_key_set(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        skip_issuer_check: bool,
        key_set: RemoteKeySet,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            skip_issuer_check,
            algorithms: vec![Algorithm::RS256],
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
            source: VerifierSource::Explicit,
            key_set,
        }
    }

    /// Expected issuer.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected audience.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Whether the `iss` claim is ignored.
    pub fn skips_issuer_check(&self) -> bool {
        self.skip_issuer_check
    }

    /// How this verifier was constructed.
    pub fn source(&self) -> VerifierSource {
        self.source
    }

    /// The JWKS endpoint backing this verifier.
    pub fn jwks_uri(&self) -> &Url {
        self.key_set.jwks_uri()
    }

    /// Accepted signing algorithms.
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Verify `token` (without the "Bearer " prefix).
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let header = decode_header(token).map_err(|e| VerifyError::InvalidHeader(e.to_string()))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(VerifyError::UnsupportedAlgorithm(header.alg));
        }

        let key = self.key_set.key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.audience]);
        if !self.skip_issuer_check {
            validation.set_issuer(&[&self.issuer]);
        }
        validation.leeway = self.leeway_seconds;

        let token_data = decode::<serde_json::Value>(token, &key, &validation).map_err(|e| {
            let msg = match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token expired",
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => "Invalid issuer",
                jsonwebtoken::errors::ErrorKind::InvalidAudience => "Invalid audience",
                jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid signature",
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => "Token not yet valid",
                _ => "Token validation failed",
            };
            VerifyError::Rejected(msg)
        })?;

        let subject = token_data
            .claims
            .get("sub")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if subject.is_empty() {
            return Err(VerifyError::Rejected("Token missing subject claim"));
        }

        let expires_at = token_data.claims.get("exp").and_then(|v| v.as_u64());

        Ok(VerifiedToken {
            subject,
            claims: token_data.claims,
            expires_at,
        })
    }
}

/// RSA algorithms advertised by the issuer, defaulting to RS256.
fn supported_algorithms(advertised: &[String]) -> Vec<Algorithm> {
    let algorithms: Vec<Algorithm> = advertised
        .iter()
        .filter_map(|name| match name.as_str() {
            "RS256" => Some(Algorithm::RS256),
            "RS384" => Some(Algorithm::RS384),
            "RS512" => Some(Algorithm::RS512),
            _ => None,
        })
        .collect();

    if algorithms.is_empty() {
        vec![Algorithm::RS256]
    } else {
        algorithms
    }
}

/// JWKS response structure.
#[derive(Debug, serde::Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

/// Individual JWK key structure.
#[derive(Debug, serde::Deserialize)]
struct JwkKey {
    /// Key ID
    kid: Option<String>,
    /// Key type (e.g., "RSA")
    kty: String,
    /// RSA modulus (base64url-encoded)
    n: Option<String>,
    /// RSA exponent (base64url-encoded)
    e: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(algs: &[&str]) -> OidcDiscovery {
        serde_json::from_value(serde_json::json!({
            "issuer": "https://issuer.example.com",
            "jwks_uri": "https://issuer.example.com/keys",
            "id_token_signing_alg_values_supported": algs,
        }))
        .unwrap()
    }

    #[test]
    fn test_from_discovery() {
        let verifier =
            TokenVerifier::from_discovery(&doc(&["RS256", "ES256"]), "client", false, reqwest::Client::new())
                .unwrap();

        assert_eq!(verifier.issuer(), "https://issuer.example.com");
        assert_eq!(verifier.audience(), "client");
        assert_eq!(verifier.source(), VerifierSource::Discovery);
        assert_eq!(verifier.algorithms(), &[Algorithm::RS256]);
        assert_eq!(verifier.jwks_uri().as_str(), "https://issuer.example.com/keys");
    }

    #[test]
    fn test_from_discovery_without_jwks_uri() {
        let mut d = doc(&[]);
        d.jwks_uri = String::new();
        assert!(TokenVerifier::from_discovery(&d, "client", false, reqwest::Client::new()).is_err());
    }

    #[test]
    fn test_explicit_lineage() {
        let keys = RemoteKeySet::new("https://issuer.example.com/jwks", reqwest::Client::new()).unwrap();
        let verifier = TokenVerifier::from_key_set("https://issuer.example.com", "aud", true, keys);

        assert_eq!(verifier.source(), VerifierSource::Explicit);
        assert!(verifier.skips_issuer_check());
    }

    #[test]
    fn test_key_set_rejects_relative_uri() {
        assert!(RemoteKeySet::new("/keys", reqwest::Client::new()).is_err());
    }

    #[test]
    fn test_supported_algorithms_default() {
        assert_eq!(supported_algorithms(&[]), vec![Algorithm::RS256]);
        assert_eq!(
            supported_algorithms(&["RS512".to_string(), "HS256".to_string()]),
            vec![Algorithm::RS512]
        );
    }

    fn jwk(kid: Option<&str>) -> JwkKey {
        JwkKey {
            kid: kid.map(str::to_string),
            kty: "RSA".to_string(),
            n: Some(TEST_MODULUS.to_string()),
            e: Some("AQAB".to_string()),
        }
    }

    const TEST_MODULUS: &str = "tSdGcuXLvEI7ICZXQN2esxVPtQDkgEtRSMUwEFoLJhZp-9dC0HmmM5K9YloBdbpj2fOwJHOdryiHR6Vu1i64by0GOSuSMKsaPeWjOYJohGBtfxFY4i7XAB9ftvcPp4DoMr0DFBQxdrmeuNaRmrKSKN5C32Sev-qXOX70cyWEmOCA9GBuLBqLXvRH-bgbacrXba4peEXnf1R3Obs5OZwo7djX78vw4s8p1RFjQx_70_u_I-J3p45Vb6lJlrBs5hdcmP29EQ6pWTNc7jxCyohMYdXsuK0HCWgTtNpvwRibcUkFtx8NwW2e0siPEl70qlVEjauv-5Kbe6RE0u3oAvDapw";

    #[test]
    fn test_key_entries_keep_every_anonymous_key() {
        let entries = KeyEntries::from_jwks(vec![jwk(None), jwk(None), jwk(Some("a"))]);

        assert_eq!(entries.len(), 3);
        assert!(entries.select(Some("a")).is_some());
        assert!(entries.select(Some("")).is_none());
        assert!(entries.select(None).is_none());
    }

    #[test]
    fn test_key_entries_single_anonymous_key_matches_unnamed_token() {
        let entries = KeyEntries::from_jwks(vec![jwk(None)]);
        assert!(entries.select(None).is_some());

        let mut not_rsa = jwk(Some("ec"));
        not_rsa.kty = "EC".to_string();
        assert!(KeyEntries::from_jwks(vec![not_rsa]).is_empty());
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage() {
        let keys = RemoteKeySet::new("https://issuer.example.com/jwks", reqwest::Client::new()).unwrap();
        let verifier = TokenVerifier::from_key_set("https://issuer.example.com", "aud", false, keys);

        let err = verifier.verify("not-a-token").await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidHeader(_)));
    }
}
