//! Identity provider bindings.
//!
//! A [`Provider`] is the shared OAuth2 base record ([`ProviderData`]) plus exactly
//! one [`ProviderBinding`] variant carrying the kind-specific constraints
//! (tenant, organization, group, signing key). The variant set is closed and
//! every dispatch over it is an exhaustive `match`.
//!
//! | Kind      | Binding                                         |
//! |-----------|-------------------------------------------------|
//! | Azure     | tenant                                          |
//! | GitHub    | organization + team                             |
//! | Keycloak  | group                                           |
//! | Google    | groups + admin email + service account          |
//! | Bitbucket | team + repository                               |
//! | OIDC      | unverified-email tolerance + user-id claim      |
//! | GitLab    | unverified-email tolerance + group + domains    |
//! | login.gov | public JWK URL + RSA signing key                |

mod binder;

pub use binder::{ProviderBinder, DEFAULT_GITLAB_ISSUER};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

use crate::error::{ConfigError, ErrorKind};
use crate::oidc::TokenVerifier;

/// Providers with no kind-specific configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericProvider {
    /// Facebook.
    Facebook,
    /// LinkedIn.
    LinkedIn,
    /// DigitalOcean.
    DigitalOcean,
    /// Nextcloud.
    Nextcloud,
}

/// Provider kind named by the `provider` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Google (the default).
    Google,
    /// Microsoft Azure AD.
    Azure,
    /// GitHub.
    GitHub,
    /// Keycloak.
    Keycloak,
    /// GitLab.
    GitLab,
    /// Bitbucket.
    Bitbucket,
    /// Any OIDC-compliant issuer.
    Oidc,
    /// login.gov.
    LoginGov,
    /// A provider without extra settings.
    Generic(GenericProvider),
}

impl ProviderKind {
    /// Default display name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Azure => "Azure",
            Self::GitHub => "GitHub",
            Self::Keycloak => "Keycloak",
            Self::GitLab => "GitLab",
            Self::Bitbucket => "Bitbucket",
            Self::Oidc => "OpenID Connect",
            Self::LoginGov => "login.gov",
            Self::Generic(GenericProvider::Facebook) => "Facebook",
            Self::Generic(GenericProvider::LinkedIn) => "LinkedIn",
            Self::Generic(GenericProvider::DigitalOcean) => "DigitalOcean",
            Self::Generic(GenericProvider::Nextcloud) => "Nextcloud",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "" | "google" => Ok(Self::Google),
            "azure" => Ok(Self::Azure),
            "github" => Ok(Self::GitHub),
            "keycloak" => Ok(Self::Keycloak),
            "gitlab" => Ok(Self::GitLab),
            "bitbucket" => Ok(Self::Bitbucket),
            "oidc" => Ok(Self::Oidc),
            "login.gov" => Ok(Self::LoginGov),
            "facebook" => Ok(Self::Generic(GenericProvider::Facebook)),
            "linkedin" => Ok(Self::Generic(GenericProvider::LinkedIn)),
            "digitalocean" => Ok(Self::Generic(GenericProvider::DigitalOcean)),
            "nextcloud" => Ok(Self::Generic(GenericProvider::Nextcloud)),
            other => Err(ConfigError::new(
                "provider",
                ErrorKind::Unsupported,
                format!("unsupported provider: {:?}", other),
            )),
        }
    }
}

/// Capability tags of a binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Restricts users to an organization, tenant or team.
    pub org_scoped: bool,
    /// Restricts users to a group.
    pub group_scoped: bool,
    /// Restricts users to email domains.
    pub domain_scoped: bool,
    /// Authenticates to the provider with a signed JWT.
    pub jwt_signing: bool,
}

/// Shared OAuth2 settings of every provider.
#[derive(Debug, Clone)]
pub struct ProviderData {
    /// Display name.
    pub display_name: String,
    /// OAuth scope.
    pub scope: String,
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// File holding the client secret.
    pub client_secret_file: String,
    /// Authorization endpoint.
    pub login_url: Option<Url>,
    /// Token endpoint.
    pub redeem_url: Option<Url>,
    /// Profile endpoint.
    pub profile_url: Option<Url>,
    /// Token validation endpoint.
    pub validate_url: Option<Url>,
    /// Protected resource.
    pub protected_resource: Option<Url>,
    /// OIDC prompt.
    pub prompt: String,
    /// OAuth approval prompt.
    pub approval_prompt: String,
    /// OIDC acr values.
    pub acr_values: String,
}

/// Google group restriction.
#[derive(Clone)]
pub struct GoogleGroupRestriction {
    /// Allowed groups.
    pub groups: Vec<String>,
    /// Admin email impersonated for directory lookups.
    pub admin_email: String,
    /// Path of the service account credentials.
    pub credentials_path: PathBuf,
    /// Raw service account credentials.
    pub credentials: Vec<u8>,
}

impl fmt::Debug for GoogleGroupRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleGroupRestriction")
            .field("groups", &self.groups)
            .field("admin_email", &self.admin_email)
            .field("credentials_path", &self.credentials_path)
            .finish_non_exhaustive()
    }
}

const PUBLIC_KEY_LABEL: &[u8] = b"PUBLIC KEY-----";

/// RSA private key used to sign client assertions.
#[derive(Clone)]
pub struct SigningKey(EncodingKey);

impl SigningKey {
    /// Parse a PEM-encoded RSA private key.
    ///
    /// `EncodingKey` only checks the PEM framing, so the key is exercised with
    /// a throwaway RS256 signature before it is accepted.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        if pem.windows(PUBLIC_KEY_LABEL.len()).any(|w| w == PUBLIC_KEY_LABEL) {
            return Err(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into());
        }
        let key = EncodingKey::from_rsa_pem(pem)?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &serde_json::json!({}), &key)?;
        Ok(Self(key))
    }

    /// The key for `jsonwebtoken::encode`.
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Kind-specific provider configuration.
#[derive(Debug, Clone)]
pub enum ProviderBinding {
    /// No extra configuration.
    Generic(GenericProvider),
    /// Azure AD tenant.
    Azure {
        /// Tenant identifier.
        tenant: String,
    },
    /// GitHub organization and team.
    GitHub {
        /// Organization.
        org: String,
        /// Team within the organization.
        team: String,
    },
    /// Keycloak group.
    Keycloak {
        /// Group name.
        group: String,
    },
    /// Google, optionally restricted to groups.
    Google {
        /// Group restriction, when a service account is configured.
        restriction: Option<GoogleGroupRestriction>,
    },
    /// Bitbucket team and repository.
    Bitbucket {
        /// Team.
        team: String,
        /// Repository.
        repository: String,
    },
    /// Generic OIDC issuer.
    Oidc {
        /// Accept unverified email claims.
        allow_unverified_email: bool,
        /// Claim used as the user id.
        user_id_claim: String,
        /// Verifier of the configured issuer.
        verifier: TokenVerifier,
    },
    /// GitLab.
    GitLab {
        /// Accept unverified email claims.
        allow_unverified_email: bool,
        /// Required group.
        group: String,
        /// Allowed email domains.
        email_domains: Vec<String>,
        /// Verifier of the configured issuer or of the public GitLab issuer.
        verifier: TokenVerifier,
    },
    /// login.gov.
    LoginGov {
        /// Public JWK URL.
        pubjwk_url: Option<Url>,
        /// Client assertion signing key.
        signing_key: SigningKey,
    },
}

impl ProviderBinding {
    /// The kind this binding belongs to.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Generic(generic) => ProviderKind::Generic(*generic),
            Self::Azure { .. } => ProviderKind::Azure,
            Self::GitHub { .. } => ProviderKind::GitHub,
            Self::Keycloak { .. } => ProviderKind::Keycloak,
            Self::Google { .. } => ProviderKind::Google,
            Self::Bitbucket { .. } => ProviderKind::Bitbucket,
            Self::Oidc { .. } => ProviderKind::Oidc,
            Self::GitLab { .. } => ProviderKind::GitLab,
            Self::LoginGov { .. } => ProviderKind::LoginGov,
        }
    }

    /// Capability tags.
    pub fn capabilities(&self) -> ProviderCapabilities {
        let none = ProviderCapabilities::default();
        match self {
            Self::Generic(_) | Self::Oidc { .. } => none,
            Self::Azure { .. } | Self::GitHub { .. } | Self::Bitbucket { .. } => ProviderCapabilities {
                org_scoped: true,
                ..none
            },
            Self::Keycloak { .. } | Self::Google { .. } => ProviderCapabilities {
                group_scoped: true,
                ..none
            },
            Self::GitLab { .. } => ProviderCapabilities {
                group_scoped: true,
                domain_scoped: true,
                ..none
            },
            Self::LoginGov { .. } => ProviderCapabilities {
                jwt_signing: true,
                ..none
            },
        }
    }

    /// The verifier bound to this provider, if any.
    pub fn verifier(&self) -> Option<&TokenVerifier> {
        match self {
            Self::Oidc { verifier, .. } | Self::GitLab { verifier, .. } => Some(verifier),
            _ => None,
        }
    }
}

/// A fully bound provider.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Shared settings.
    pub data: ProviderData,
    /// Kind-specific settings.
    pub binding: ProviderBinding,
}

impl Provider {
    /// The provider kind.
    pub fn kind(&self) -> ProviderKind {
        self.binding.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!("".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert_eq!("login.gov".parse::<ProviderKind>().unwrap(), ProviderKind::LoginGov);
        assert_eq!(
            "linkedin".parse::<ProviderKind>().unwrap(),
            ProviderKind::Generic(GenericProvider::LinkedIn)
        );
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let err = "myspace".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
        assert_eq!(err.setting, "provider");
    }

    #[test]
    fn test_capabilities() {
        let github = ProviderBinding::GitHub {
            org: "acme".to_string(),
            team: String::new(),
        };
        assert!(github.capabilities().org_scoped);
        assert!(!github.capabilities().group_scoped);

        let keycloak = ProviderBinding::Keycloak {
            group: "admins".to_string(),
        };
        assert!(keycloak.capabilities().group_scoped);
        assert_eq!(keycloak.kind(), ProviderKind::Keycloak);

        let generic = ProviderBinding::Generic(GenericProvider::Facebook);
        assert_eq!(generic.capabilities(), ProviderCapabilities::default());
        assert!(generic.verifier().is_none());
    }

    #[test]
    fn test_signing_key_rejects_garbage() {
        assert!(SigningKey::from_rsa_pem(b"not a pem").is_err());
    }

    #[test]
    fn test_signing_key_requires_private_key() {
        let private = include_str!("../../tests/fixtures/rsa_key.pem");
        let public = include_str!("../../tests/fixtures/rsa_public_key.pem");

        assert!(SigningKey::from_rsa_pem(private.as_bytes()).is_ok());
        assert!(SigningKey::from_rsa_pem(public.as_bytes()).is_err());

        // Well-formed DER under a private-key label that is not a private key.
        let relabelled = public.replace("RSA PUBLIC KEY", "RSA PRIVATE KEY");
        assert!(SigningKey::from_rsa_pem(relabelled.as_bytes()).is_err());
    }
}
