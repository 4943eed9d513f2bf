//! Primary issuer resolution.
//!
//! Three paths lead to a verifier:
//!
//! - **Discovery** (default): fetch the issuer's discovery document, fill any
//!   endpoint the operator left blank and build the verifier from the document.
//!   Failure here is fatal.
//! - **Explicit** (`skip_oidc_discovery`): login, redeem and JWKS URLs must be
//!   configured; the verifier is built against the given JWKS URL.
//! - **Probe**: when the issuer check is skipped but discovery is not, one
//!   discovery attempt pre-fills the endpoints and the explicit path follows.
//!   A failed probe is logged and the explicit path runs with whatever the
//!   operator configured.

use super::discovery::{discover, fetch_discovery_doc, OidcDiscovery};
use super::verifier::{RemoteKeySet, TokenVerifier};
use crate::error::{ConfigError, DiscoveryError, ValidationErrors};
use crate::options::Options;

/// Scope used when an issuer is configured without one.
pub const DEFAULT_OIDC_SCOPE: &str = "openid email profile";

/// Which path produced the primary verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// No issuer configured.
    Disabled,
    /// Discovery document drove verifier construction.
    Discovery,
    /// Explicit endpoints drove verifier construction.
    Explicit,
    /// A successful probe pre-filled the endpoints for the explicit path.
    Probed,
}

/// Provider endpoints after issuer resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    /// Authorization endpoint.
    pub login_url: String,
    /// Token endpoint.
    pub redeem_url: String,
    /// Userinfo endpoint.
    pub profile_url: String,
    /// JWKS endpoint.
    pub jwks_url: String,
}

impl ResolvedEndpoints {
    /// Endpoints as configured by the operator.
    pub fn from_options(opts: &Options) -> Self {
        Self {
            login_url: opts.login_url.clone(),
            redeem_url: opts.redeem_url.clone(),
            profile_url: opts.profile_url.clone(),
            jwks_url: opts.oidc_jwks_url.clone(),
        }
    }

    /// Fill blank endpoints from `doc`. Configured values win.
    pub fn fill_from(&mut self, doc: &OidcDiscovery) {
        fill(&mut self.login_url, &doc.authorization_endpoint);
        fill(&mut self.redeem_url, &doc.token_endpoint);
        fill(&mut self.profile_url, &doc.userinfo_endpoint);
        fill(&mut self.jwks_url, &doc.jwks_uri);
    }
}

fn fill(target: &mut String, discovered: &str) {
    if target.is_empty() {
        *target = discovered.to_string();
    }
}

/// Outcome of primary issuer resolution.
#[derive(Debug, Clone)]
pub struct OidcResolution {
    /// Primary verifier, when one could be built.
    pub verifier: Option<TokenVerifier>,
    /// Endpoints for the provider binding.
    pub endpoints: ResolvedEndpoints,
    /// Effective scope.
    pub scope: String,
    /// Path taken.
    pub mode: ResolutionMode,
}

/// Resolves the configured OIDC issuer into endpoints and a verifier.
#[derive(Debug, Clone, Copy)]
pub struct OidcBuilder<'a> {
    http_client: &'a reqwest::Client,
}

impl<'a> OidcBuilder<'a> {
    /// Create a builder using `http_client` for every request.
    pub fn new(http_client: &'a reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Resolve the issuer configured in `opts`.
    ///
    /// Missing explicit endpoints are pushed onto `errors`. A discovery-mode
    /// failure is returned as `Err` and must abort the validation pass.
    pub async fn resolve(
        &self,
        opts: &Options,
        errors: &mut ValidationErrors,
    ) -> Result<OidcResolution, DiscoveryError> {
        let mut endpoints = ResolvedEndpoints::from_options(opts);
        let issuer = opts.oidc_issuer_url.as_str();

        if issuer.is_empty() {
            return Ok(OidcResolution {
                verifier: None,
                endpoints,
                scope: opts.scope.clone(),
                mode: ResolutionMode::Disabled,
            });
        }

        let mut mode = if opts.skip_oidc_discovery {
            ResolutionMode::Explicit
        } else {
            ResolutionMode::Discovery
        };

        if opts.insecure_oidc_skip_issuer_verification && !opts.skip_oidc_discovery {
            tracing::info!(issuer = %issuer, "Performing OIDC discovery probe");
            match fetch_discovery_doc(self.http_client, issuer).await {
                Ok(doc) => {
                    endpoints.fill_from(&doc);
                    mode = ResolutionMode::Probed;
                },
                Err(err) => {
                    tracing::warn!(
                        issuer = %issuer,
                        error = %err,
                        "OIDC discovery probe failed, continuing with explicit endpoints"
                    );
                    mode = ResolutionMode::Explicit;
                },
            }
        }

        let verifier = match mode {
            ResolutionMode::Discovery => {
                let doc = discover(self.http_client, issuer).await?;
                endpoints.fill_from(&doc);
                Some(TokenVerifier::from_discovery(
                    &doc,
                    &opts.client_id,
                    opts.insecure_oidc_skip_issuer_verification,
                    self.http_client.clone(),
                )?)
            },
            _ => self.explicit_verifier(opts, &endpoints, errors),
        };

        let scope = if opts.scope.is_empty() {
            DEFAULT_OIDC_SCOPE.to_string()
        } else {
            opts.scope.clone()
        };

        Ok(OidcResolution {
            verifier,
            endpoints,
            scope,
            mode,
        })
    }

    fn explicit_verifier(
        &self,
        opts: &Options,
        endpoints: &ResolvedEndpoints,
        errors: &mut ValidationErrors,
    ) -> Option<TokenVerifier> {
        if endpoints.login_url.is_empty() {
            errors.push(ConfigError::missing("login-url"));
        }
        if endpoints.redeem_url.is_empty() {
            errors.push(ConfigError::missing("redeem-url"));
        }
        if endpoints.jwks_url.is_empty() {
            errors.push(ConfigError::missing("oidc-jwks-url"));
            return None;
        }

        match RemoteKeySet::new(&endpoints.jwks_url, self.http_client.clone()) {
            Ok(key_set) => Some(TokenVerifier::from_key_set(
                &opts.oidc_issuer_url,
                &opts.client_id,
                opts.insecure_oidc_skip_issuer_verification,
                key_set,
            )),
            Err(err) => {
                errors.push(ConfigError::malformed(
                    "oidc-jwks-url",
                    format!("invalid oidc-jwks-url: {}", err),
                ));
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::oidc::verifier::VerifierSource;

    #[test]
    fn test_fill_keeps_configured_values() {
        let mut endpoints = ResolvedEndpoints {
            login_url: "https://configured/login".to_string(),
            ..ResolvedEndpoints::default()
        };
        let doc: OidcDiscovery = serde_json::from_value(serde_json::json!({
            "issuer": "https://issuer",
            "authorization_endpoint": "https://issuer/auth",
            "token_endpoint": "https://issuer/token",
            "jwks_uri": "https://issuer/keys",
        }))
        .unwrap();

        endpoints.fill_from(&doc);

        assert_eq!(endpoints.login_url, "https://configured/login");
        assert_eq!(endpoints.redeem_url, "https://issuer/token");
        assert_eq!(endpoints.jwks_url, "https://issuer/keys");
        assert!(endpoints.profile_url.is_empty());
    }

    #[tokio::test]
    async fn test_no_issuer_is_disabled() {
        let client = reqwest::Client::new();
        let mut errors = ValidationErrors::new();
        let opts = Options::default();

        let res = OidcBuilder::new(&client).resolve(&opts, &mut errors).await.unwrap();

        assert_eq!(res.mode, ResolutionMode::Disabled);
        assert!(res.verifier.is_none());
        assert!(res.scope.is_empty());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_mode_reports_each_missing_url() {
        let client = reqwest::Client::new();
        let mut errors = ValidationErrors::new();
        let opts = Options {
            oidc_issuer_url: "https://issuer.example.com".to_string(),
            skip_oidc_discovery: true,
            ..Options::default()
        };

        let res = OidcBuilder::new(&client).resolve(&opts, &mut errors).await.unwrap();

        assert_eq!(res.mode, ResolutionMode::Explicit);
        assert!(res.verifier.is_none());
        assert_eq!(errors.len(), 3);
        assert!(errors.has_setting("login-url"));
        assert!(errors.has_setting("redeem-url"));
        assert!(errors.has_setting("oidc-jwks-url"));
        assert_eq!(res.scope, DEFAULT_OIDC_SCOPE);
    }

    #[tokio::test]
    async fn test_explicit_mode_builds_verifier() {
        let client = reqwest::Client::new();
        let mut errors = ValidationErrors::new();
        let opts = Options {
            oidc_issuer_url: "https://issuer.example.com".to_string(),
            client_id: "client".to_string(),
            skip_oidc_discovery: true,
            login_url: "https://issuer.example.com/auth".to_string(),
            redeem_url: "https://issuer.example.com/token".to_string(),
            oidc_jwks_url: "https://issuer.example.com/keys".to_string(),
            scope: "openid".to_string(),
            ..Options::default()
        };

        let res = OidcBuilder::new(&client).resolve(&opts, &mut errors).await.unwrap();
        let verifier = res.verifier.unwrap();

        assert!(errors.is_empty());
        assert_eq!(verifier.source(), VerifierSource::Explicit);
        assert_eq!(verifier.audience(), "client");
        assert_eq!(res.scope, "openid");
    }

    #[tokio::test]
    async fn test_explicit_mode_malformed_jwks_url() {
        let client = reqwest::Client::new();
        let mut errors = ValidationErrors::new();
        let opts = Options {
            oidc_issuer_url: "https://issuer.example.com".to_string(),
            skip_oidc_discovery: true,
            login_url: "https://issuer.example.com/auth".to_string(),
            redeem_url: "https://issuer.example.com/token".to_string(),
            oidc_jwks_url: "keys".to_string(),
            ..Options::default()
        };

        let res = OidcBuilder::new(&client).resolve(&opts, &mut errors).await.unwrap();

        assert!(res.verifier.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors.has_kind(ErrorKind::Malformed));
    }
}
