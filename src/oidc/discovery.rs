//! OIDC discovery document and fetch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::error::DiscoveryError;

/// Path of the discovery document relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Path of the bare key set used when an issuer has no discovery document.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// OIDC Discovery document (from .well-known/openid-configuration).
///
/// Endpoint fields default to empty strings so that a partial document still
/// parses; callers decide which endpoints they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcDiscovery {
    /// Issuer identifier.
    pub issuer: String,

    /// Authorization endpoint URL.
    #[serde(default)]
    pub authorization_endpoint: String,

    /// Token endpoint URL.
    #[serde(default)]
    pub token_endpoint: String,

    /// JWKS URI for token validation.
    #[serde(default)]
    pub jwks_uri: String,

    /// `UserInfo` endpoint URL.
    #[serde(default)]
    pub userinfo_endpoint: String,

    /// Supported ID token signing algorithms.
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// Supported scopes.
    #[serde(default)]
    pub scopes_supported: Vec<String>,

    /// Additional metadata.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// `<issuer>/.well-known/openid-configuration`, with trailing slashes trimmed.
pub fn discovery_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), DISCOVERY_PATH)
}

/// `<issuer>/.well-known/jwks.json`, with trailing slashes trimmed.
pub fn jwks_fallback_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), JWKS_PATH)
}

/// Parse `raw` as an absolute URL, mapping failures to [`DiscoveryError::InvalidUrl`].
pub(crate) fn parse_absolute(raw: &str) -> Result<Url, DiscoveryError> {
    Url::parse(raw).map_err(|e| DiscoveryError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Fetch the discovery document for `issuer`.
///
/// The request is bounded by the timeout configured on `http_client`. The
/// document's `issuer` is not checked here; see [`discover`].
pub async fn fetch_discovery_doc(
    http_client: &reqwest::Client,
    issuer: &str,
) -> Result<OidcDiscovery, DiscoveryError> {
    let url = parse_absolute(&discovery_url(issuer))?;
    tracing::debug!("Fetching OIDC discovery from {}", url);

    let response = http_client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| DiscoveryError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(DiscoveryError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    response.json().await.map_err(|e| DiscoveryError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Fetch the discovery document and require that it names `issuer`.
pub async fn discover(
    http_client: &reqwest::Client,
    issuer: &str,
) -> Result<OidcDiscovery, DiscoveryError> {
    let doc = fetch_discovery_doc(http_client, issuer).await?;
    if doc.issuer != issuer {
        return Err(DiscoveryError::IssuerMismatch {
            expected: issuer.to_string(),
            actual: doc.issuer,
        });
    }
    Ok(doc)
}
