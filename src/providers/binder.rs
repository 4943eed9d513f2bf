use super::{
    GoogleGroupRestriction, Provider, ProviderBinding, ProviderData, ProviderKind, SigningKey,
};
use crate::error::{ConfigError, ErrorKind, ValidationErrors};
use crate::oidc::{discover, OidcResolution, TokenVerifier};
use crate::options::Options;
use crate::validation::urls::parse_url;
use std::path::PathBuf;

/// Issuer used by the GitLab provider when no issuer is configured.
pub const DEFAULT_GITLAB_ISSUER: &str = "https://gitlab.com";

/// Builds the [`Provider`] named by the `provider` setting.
#[derive(Debug, Clone, Copy)]
pub struct ProviderBinder<'a> {
    http_client: &'a reqwest::Client,
    gitlab_issuer: &'a str,
}

impl<'a> ProviderBinder<'a> {
    /// Create a binder using `http_client` for GitLab's default discovery.
    pub fn new(http_client: &'a reqwest::Client) -> Self {
        Self {
            http_client,
            gitlab_issuer: DEFAULT_GITLAB_ISSUER,
        }
    }

    /// Override the issuer GitLab falls back to.
    pub fn with_gitlab_issuer(mut self, issuer: &'a str) -> Self {
        self.gitlab_issuer = issuer;
        self
    }

    /// Bind the configured provider.
    ///
    /// Returns `None` when the kind is unknown or a binding step failed; the
    /// reason is on `errors` unless it was already reported by issuer resolution.
    pub async fn bind(
        &self,
        opts: &Options,
        oidc: &OidcResolution,
        errors: &mut ValidationErrors,
    ) -> Option<Provider> {
        let mut data = provider_data(opts, oidc, errors);

        let kind = match opts.provider.parse::<ProviderKind>() {
            Ok(kind) => kind,
            Err(err) => {
                errors.push(err);
                return None;
            },
        };
        if data.display_name.is_empty() {
            data.display_name = kind.display_name().to_string();
        }

        let binding = match kind {
            ProviderKind::Generic(generic) => ProviderBinding::Generic(generic),
            ProviderKind::Azure => ProviderBinding::Azure {
                tenant: opts.azure_tenant.clone(),
            },
            ProviderKind::GitHub => ProviderBinding::GitHub {
                org: opts.github_org.clone(),
                team: opts.github_team.clone(),
            },
            ProviderKind::Keycloak => ProviderBinding::Keycloak {
                group: opts.keycloak_group.clone(),
            },
            ProviderKind::Bitbucket => ProviderBinding::Bitbucket {
                team: opts.bitbucket_team.clone(),
                repository: opts.bitbucket_repository.clone(),
            },
            ProviderKind::Google => bind_google(opts, errors)?,
            ProviderKind::Oidc => bind_oidc(opts, oidc, errors)?,
            ProviderKind::GitLab => self.bind_gitlab(opts, oidc, &mut data, errors).await?,
            ProviderKind::LoginGov => bind_login_gov(opts, errors)?,
        };

        tracing::debug!(
            provider = %data.display_name,
            capabilities = ?binding.capabilities(),
            "Provider bound"
        );
        Some(Provider { data, binding })
    }

    async fn bind_gitlab(
        &self,
        opts: &Options,
        oidc: &OidcResolution,
        data: &mut ProviderData,
        errors: &mut ValidationErrors,
    ) -> Option<ProviderBinding> {
        let verifier = match &oidc.verifier {
            Some(verifier) => verifier.clone(),
            // A configured issuer that produced no verifier has already been reported.
            None if !opts.oidc_issuer_url.is_empty() => return None,
            None => self.default_gitlab_verifier(opts, data, errors).await?,
        };

        Some(ProviderBinding::GitLab {
            allow_unverified_email: opts.insecure_oidc_allow_unverified_email,
            group: opts.gitlab_group.clone(),
            email_domains: opts.email_domains.clone(),
            verifier,
        })
    }

    async fn default_gitlab_verifier(
        &self,
        opts: &Options,
        data: &mut ProviderData,
        errors: &mut ValidationErrors,
    ) -> Option<TokenVerifier> {
        let built = match discover(self.http_client, self.gitlab_issuer).await {
            Ok(doc) => {
                data.login_url = parse_url(&doc.authorization_endpoint, "login", errors);
                data.redeem_url = parse_url(&doc.token_endpoint, "redeem", errors);
                TokenVerifier::from_discovery(&doc, &opts.client_id, false, self.http_client.clone())
            },
            Err(err) => Err(err),
        };

        match built {
            Ok(verifier) => Some(verifier),
            Err(err) => {
                tracing::warn!(issuer = %self.gitlab_issuer, error = %err, "GitLab discovery failed");
                errors.push(ConfigError::new(
                    "provider",
                    ErrorKind::Provider,
                    "failed to initialize oidc provider for gitlab.com",
                ));
                None
            },
        }
    }
}

fn provider_data(opts: &Options, oidc: &OidcResolution, errors: &mut ValidationErrors) -> ProviderData {
    ProviderData {
        display_name: opts.provider_display_name.clone(),
        scope: oidc.scope.clone(),
        client_id: opts.client_id.clone(),
        client_secret: opts.client_secret.clone(),
        client_secret_file: opts.client_secret_file.clone(),
        login_url: parse_url(&oidc.endpoints.login_url, "login", errors),
        redeem_url: parse_url(&oidc.endpoints.redeem_url, "redeem", errors),
        profile_url: parse_url(&oidc.endpoints.profile_url, "profile", errors),
        validate_url: parse_url(&opts.validate_url, "validate", errors),
        protected_resource: parse_url(&opts.protected_resource, "resource", errors),
        prompt: opts.prompt.clone(),
        approval_prompt: opts.approval_prompt.clone(),
        acr_values: opts.acr_values.clone(),
    }
}

fn bind_google(opts: &Options, errors: &mut ValidationErrors) -> Option<ProviderBinding> {
    // Missing members of the groups/admin/credentials trio are reported with the
    // other required settings; only the credentials file is handled here.
    let path = opts.google_service_account_json.as_str();
    if path.is_empty() {
        return Some(ProviderBinding::Google { restriction: None });
    }

    match std::fs::read(path) {
        Ok(credentials) => Some(ProviderBinding::Google {
            restriction: Some(GoogleGroupRestriction {
                groups: opts.google_groups.clone(),
                admin_email: opts.google_admin_email.clone(),
                credentials_path: PathBuf::from(path),
                credentials,
            }),
        }),
        Err(err) => {
            tracing::debug!(path = %path, error = %err, "Cannot read Google credentials");
            errors.push(ConfigError::new(
                "google-service-account-json",
                ErrorKind::Unreadable,
                format!("invalid Google credentials file: {}", path),
            ));
            None
        },
    }
}

fn bind_oidc(opts: &Options, oidc: &OidcResolution, errors: &mut ValidationErrors) -> Option<ProviderBinding> {
    let Some(verifier) = oidc.verifier.clone() else {
        if opts.oidc_issuer_url.is_empty() {
            errors.push(ConfigError::new(
                "oidc-issuer-url",
                ErrorKind::Missing,
                "oidc provider requires an oidc issuer URL",
            ));
        }
        return None;
    };

    Some(ProviderBinding::Oidc {
        allow_unverified_email: opts.insecure_oidc_allow_unverified_email,
        user_id_claim: opts.user_id_claim.clone(),
        verifier,
    })
}

fn bind_login_gov(opts: &Options, errors: &mut ValidationErrors) -> Option<ProviderBinding> {
    let pubjwk_url = parse_url(&opts.pubjwk_url, "pubjwk", errors);
    let signing_key = load_signing_key(opts, errors)?;
    Some(ProviderBinding::LoginGov {
        pubjwk_url,
        signing_key,
    })
}

fn load_signing_key(opts: &Options, errors: &mut ValidationErrors) -> Option<SigningKey> {
    match (opts.jwt_key.is_empty(), opts.jwt_key_file.is_empty()) {
        (false, false) => {
            errors.push(ConfigError::new(
                "jwt-key",
                ErrorKind::MutuallyExclusive,
                "cannot set both jwt-key and jwt-key-file options",
            ));
            None
        },
        (true, true) => {
            errors.push(ConfigError::new(
                "jwt-key",
                ErrorKind::Missing,
                "login.gov provider requires a private key for signing JWTs",
            ));
            None
        },
        (false, true) => match SigningKey::from_rsa_pem(opts.jwt_key.as_bytes()) {
            Ok(key) => Some(key),
            Err(_) => {
                errors.push(ConfigError::malformed("jwt-key", "could not parse RSA Private Key PEM"));
                None
            },
        },
        (true, false) => {
            let path = opts.jwt_key_file.as_str();
            let pem = match std::fs::read(path) {
                Ok(pem) => pem,
                Err(_) => {
                    errors.push(ConfigError::new(
                        "jwt-key-file",
                        ErrorKind::Unreadable,
                        format!("could not read key file: {}", path),
                    ));
                    return None;
                },
            };
            match SigningKey::from_rsa_pem(&pem) {
                Ok(key) => Some(key),
                Err(_) => {
                    errors.push(ConfigError::malformed(
                        "jwt-key-file",
                        format!("could not parse private key from PEM file: {}", path),
                    ));
                    None
                },
            }
        },
    }
}
