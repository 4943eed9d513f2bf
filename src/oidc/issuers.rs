//! Extra trusted issuers for bearer-token mode.
//!
//! Each entry has the form `issuer=audience`. An issuer is first tried as an
//! OIDC provider; if discovery fails it is treated as a bare JWKS host serving
//! `<issuer>/.well-known/jwks.json`.

use std::fmt;
use std::str::FromStr;

use super::discovery::{discover, jwks_fallback_url};
use super::verifier::{RemoteKeySet, TokenVerifier};
use crate::error::{ConfigError, DiscoveryError, ErrorKind, ValidationErrors};

/// Setting name used in error records.
const SETTING: &str = "extra-jwt-issuers";

/// A trusted issuer and the audience its tokens must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerBinding {
    /// Issuer URI.
    pub issuer_uri: String,
    /// Expected audience.
    pub audience: String,
}

impl FromStr for IssuerBinding {
    type Err = ConfigError;

    /// Split on the first `=`; the audience may itself contain `=`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        match spec.split_once('=') {
            Some((issuer_uri, audience)) => Ok(Self {
                issuer_uri: issuer_uri.to_string(),
                audience: audience.to_string(),
            }),
            None => Err(ConfigError::malformed(
                SETTING,
                format!("invalid jwt verifier uri=audience spec: {}", spec),
            )),
        }
    }
}

impl fmt::Display for IssuerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.issuer_uri, self.audience)
    }
}

/// Parse every entry, skipping malformed ones and recording an error for each.
pub fn parse_jwt_issuers(specs: &[String], errors: &mut ValidationErrors) -> Vec<IssuerBinding> {
    let mut bindings = Vec::with_capacity(specs.len());
    for spec in specs {
        match spec.parse::<IssuerBinding>() {
            Ok(binding) => bindings.push(binding),
            Err(err) => errors.push(err),
        }
    }
    bindings
}

/// Build a verifier for one extra issuer.
///
/// Discovery is attempted first. On failure the issuer is treated as a JWKS
/// host; only a failure to construct that fallback is returned.
pub async fn verifier_for_issuer(
    http_client: &reqwest::Client,
    binding: &IssuerBinding,
) -> Result<TokenVerifier, DiscoveryError> {
    match discover(http_client, &binding.issuer_uri).await {
        Ok(doc) => TokenVerifier::from_discovery(&doc, &binding.audience, false, http_client.clone()),
        Err(err) => {
            tracing::debug!(
                issuer = %binding.issuer_uri,
                error = %err,
                "Issuer discovery failed, trying bare JWKS"
            );
            let key_set = RemoteKeySet::new(&jwks_fallback_url(&binding.issuer_uri), http_client.clone())?;
            Ok(TokenVerifier::from_key_set(
                &binding.issuer_uri,
                &binding.audience,
                false,
                key_set,
            ))
        },
    }
}

/// Assemble the bearer-mode verifier list.
///
/// `primary` (the configured issuer's verifier, if any) comes first, followed by
/// one verifier per well-formed `issuer=audience` entry. Malformed entries and
/// issuers whose fallback cannot be built are recorded and skipped.
pub async fn resolve_bearer_verifiers(
    http_client: &reqwest::Client,
    primary: Option<&TokenVerifier>,
    extra_issuers: &[String],
    errors: &mut ValidationErrors,
) -> Vec<TokenVerifier> {
    let mut verifiers: Vec<TokenVerifier> = primary.into_iter().cloned().collect();

    for binding in parse_jwt_issuers(extra_issuers, errors) {
        match verifier_for_issuer(http_client, &binding).await {
            Ok(verifier) => verifiers.push(verifier),
            Err(err) => errors.push(ConfigError::new(
                SETTING,
                ErrorKind::Provider,
                format!("error building verifiers: {}", err),
            )),
        }
    }

    verifiers
}
