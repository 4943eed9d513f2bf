//! The validation pass.
//!
//! [`Validator::validate`] runs every check over one [`Options`] value and
//! either publishes a complete [`ValidatedConfiguration`] or returns every
//! defect it found in a single [`Error::Invalid`]. The only early exit is a
//! primary issuer that cannot be discovered ([`Error::Discovery`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use authgate::{validate, Options};
//!
//! # async fn run() -> authgate::Result<()> {
//! let opts = Options::from_file("authgate.toml")?;
//! let config = validate(&opts).await?;
//! println!("bound provider: {}", config.provider.data.display_name);
//! # Ok(())
//! # }
//! ```

pub mod cookie;
pub mod signature;
pub mod urls;

use regex::Regex;
use std::sync::Arc;
use url::Url;

use crate::cipher::SymmetricCipher;
use crate::error::{ConfigError, Error, ErrorKind, Result, ValidationErrors};
use crate::http::{build_client, HttpSettings};
use crate::logging::{validate_logging, LoggingSettings};
use crate::oidc::{resolve_bearer_verifiers, OidcBuilder, ResolutionMode, TokenVerifier};
use crate::options::Options;
use crate::providers::{Provider, ProviderBinder, DEFAULT_GITLAB_ISSUER};
use crate::session::{DefaultSessionStoreFactory, SessionStoreFactory, SessionStoreHandle};
use cookie::{build_cipher, validate_cookie, CookieSettings};
use signature::{parse_signature_key, SignatureSpec};
use urls::{compile_patterns, parse_redirect_url, parse_upstreams, RedirectUrl};

/// Runtime configuration produced by a successful validation pass.
#[derive(Debug, Clone)]
pub struct ValidatedConfiguration {
    /// Path prefix for the gateway's own endpoints.
    pub proxy_prefix: String,
    /// Whether forwarded headers from a fronting proxy are trusted.
    pub reverse_proxy: bool,
    /// OAuth callback URL.
    pub redirect_url: Option<RedirectUrl>,
    /// Upstreams to proxy to.
    pub upstreams: Vec<Url>,
    /// Path patterns that bypass authentication.
    pub skip_auth_regex: Vec<Regex>,
    /// Header patterns that bypass authentication.
    pub skip_auth_header: Vec<Regex>,
    /// The bound identity provider.
    pub provider: Provider,
    /// Request signing key.
    pub signature: Option<SignatureSpec>,
    /// Verifier of the configured OIDC issuer.
    pub oidc_verifier: Option<TokenVerifier>,
    /// How the OIDC issuer was resolved.
    pub oidc_mode: ResolutionMode,
    /// Verifiers accepted in bearer-token mode, primary issuer first.
    pub jwt_bearer_verifiers: Vec<TokenVerifier>,
    /// Cookie policy.
    pub cookie: CookieSettings,
    /// Cookie cipher.
    pub cipher: Option<SymmetricCipher>,
    /// Session store.
    pub session_store: SessionStoreHandle,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Runs the validation pass.
#[derive(Clone)]
pub struct Validator {
    http_client: reqwest::Client,
    session_factory: Arc<dyn SessionStoreFactory>,
    gitlab_issuer: String,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("gitlab_issuer", &self.gitlab_issuer)
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// Create a validator with an HTTP client built from `opts`.
    pub fn from_options(opts: &Options) -> Result<Self> {
        let client = build_client(HttpSettings::from_options(opts))?;
        Ok(Self::with_http_client(client))
    }

    /// Create a validator using `http_client` for every outbound request.
    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            session_factory: Arc::new(DefaultSessionStoreFactory),
            gitlab_issuer: DEFAULT_GITLAB_ISSUER.to_string(),
        }
    }

    /// Replace the session store factory.
    pub fn with_session_factory(mut self, factory: Arc<dyn SessionStoreFactory>) -> Self {
        self.session_factory = factory;
        self
    }

    /// Replace the issuer GitLab binds to when none is configured.
    pub fn with_gitlab_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.gitlab_issuer = issuer.into();
        self
    }

    /// Validate `opts`.
    pub async fn validate(&self, opts: &Options) -> Result<ValidatedConfiguration> {
        let mut errors = ValidationErrors::new();

        let logging = validate_logging(opts, &mut errors);
        check_required(opts, &mut errors);

        let oidc = OidcBuilder::new(&self.http_client).resolve(opts, &mut errors).await?;

        let jwt_bearer_verifiers = if opts.skip_jwt_bearer_tokens {
            resolve_bearer_verifiers(
                &self.http_client,
                oidc.verifier.as_ref(),
                &opts.extra_jwt_issuers,
                &mut errors,
            )
            .await
        } else {
            Vec::new()
        };

        let redirect_url = parse_redirect_url(&opts.redirect_url, &mut errors);
        let upstreams = parse_upstreams(&opts.upstreams, &mut errors);
        let skip_auth_regex = compile_patterns(&opts.skip_auth_regex, "skip-auth-regex", &mut errors);
        let skip_auth_header = compile_patterns(&opts.skip_auth_header, "skip-auth-header", &mut errors);

        let provider = ProviderBinder::new(&self.http_client)
            .with_gitlab_issuer(&self.gitlab_issuer)
            .bind(opts, &oidc, &mut errors)
            .await;

        let cipher = build_cipher(opts, &mut errors);
        let cookie = validate_cookie(&opts.cookie, &mut errors);
        let session_store = match self.session_factory.build(&opts.session, &cookie, cipher.as_ref()) {
            Ok(store) => Some(store),
            Err(err) => {
                errors.push(ConfigError::new(
                    "session-store-type",
                    ErrorKind::Session,
                    format!("error initialising session storage: {}", err),
                ));
                None
            },
        };

        let signature = parse_signature_key(&opts.signature_key, &mut errors);
        check_header_flags(opts, &mut errors);

        let (Some(provider), Some(session_store)) = (provider, session_store) else {
            // Every path that leaves these unset records an error first.
            return Err(Error::Invalid(errors));
        };
        if !errors.is_empty() {
            tracing::debug!(count = errors.len(), "Configuration rejected");
        }

        let config = errors.into_result(ValidatedConfiguration {
            proxy_prefix: opts.proxy_prefix.clone(),
            reverse_proxy: opts.reverse_proxy,
            redirect_url,
            upstreams,
            skip_auth_regex,
            skip_auth_header,
            provider,
            signature,
            oidc_verifier: oidc.verifier,
            oidc_mode: oidc.mode,
            jwt_bearer_verifiers,
            cookie,
            cipher,
            session_store,
            logging,
        })?;

        tracing::info!(
            provider = %config.provider.data.display_name,
            oidc_mode = ?config.oidc_mode,
            upstreams = config.upstreams.len(),
            bearer_verifiers = config.jwt_bearer_verifiers.len(),
            session_store = config.session_store.kind(),
            "Configuration validated"
        );
        Ok(config)
    }
}

/// Validate `opts` with an HTTP client built from its own settings.
pub async fn validate(opts: &Options) -> Result<ValidatedConfiguration> {
    Validator::from_options(opts)?.validate(opts).await
}

fn check_required(opts: &Options, errors: &mut ValidationErrors) {
    if opts.cookie.secret.is_empty() {
        errors.push(ConfigError::missing("cookie-secret"));
    }
    if opts.client_id.is_empty() {
        errors.push(ConfigError::missing("client-id"));
    }

    // login.gov authenticates with a signed JWT instead of a client secret.
    if opts.client_secret.is_empty() && !opts.is_login_gov() {
        if opts.client_secret_file.is_empty() {
            errors.push(ConfigError::missing("client-secret or client-secret-file"));
        } else if std::fs::read(&opts.client_secret_file).is_err() {
            errors.push(ConfigError::new(
                "client-secret-file",
                ErrorKind::Unreadable,
                format!("could not read client secret file: {}", opts.client_secret_file),
            ));
        }
    }

    if opts.authenticated_emails_file.is_empty()
        && opts.email_domains.is_empty()
        && opts.htpasswd_file.is_empty()
    {
        errors.push(ConfigError::new(
            "email-domain",
            ErrorKind::Missing,
            "missing setting for email validation: email-domain or authenticated-emails-file required.",
        ));
    }

    if !opts.google_groups.is_empty()
        || !opts.google_admin_email.is_empty()
        || !opts.google_service_account_json.is_empty()
    {
        if opts.google_groups.is_empty() {
            errors.push(ConfigError::missing("google-group"));
        }
        if opts.google_admin_email.is_empty() {
            errors.push(ConfigError::missing("google-admin-email"));
        }
        if opts.google_service_account_json.is_empty() {
            errors.push(ConfigError::missing("google-service-account-json"));
        }
    }
}

fn check_header_flags(opts: &Options, errors: &mut ValidationErrors) {
    if opts.set_basic_auth && opts.set_authorization_header {
        errors.push(ConfigError::new(
            "set-basic-auth",
            ErrorKind::MutuallyExclusive,
            "mutually exclusive: set-basic-auth and set-authorization-header can not both be true",
        ));
    }

    if opts.prefer_email_to_user && !opts.pass_basic_auth && !opts.pass_user_headers {
        errors.push(ConfigError::new(
            "prefer-email-to-user",
            ErrorKind::Conflict,
            "PreferEmailToUser should only be used with PassBasicAuth or PassUserHeaders",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_options() -> Options {
        Options {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            email_domains: vec!["*".to_string()],
            upstreams: vec!["http://127.0.0.1:8080".to_string()],
            cookie: crate::options::CookieOptions {
                secret: "cookie.secret.16".to_string(),
                ..Default::default()
            },
            ..Options::default()
        }
    }

    async fn run(opts: &Options) -> Result<ValidatedConfiguration> {
        Validator::with_http_client(reqwest::Client::new()).validate(opts).await
    }

    #[tokio::test]
    async fn test_minimal_google_configuration() {
        let config = run(&valid_options()).await.unwrap();

        assert_eq!(config.provider.data.display_name, "Google");
        assert_eq!(config.upstreams[0].as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.oidc_mode, ResolutionMode::Disabled);
        assert!(config.cipher.is_none());
        assert!(config.jwt_bearer_verifiers.is_empty());
        assert_eq!(config.session_store.kind(), "cookie");
        assert_eq!(config.proxy_prefix, "/oauth2");
        assert!(!config.reverse_proxy);
    }

    #[tokio::test]
    async fn test_path_only_redirect_url() {
        let mut opts = valid_options();
        opts.redirect_url = "/oauth2/callback".to_string();
        opts.proxy_prefix = "/auth".to_string();
        opts.reverse_proxy = true;

        let config = run(&opts).await.unwrap();
        let redirect = config.redirect_url.unwrap();

        assert!(redirect.is_relative());
        assert_eq!(redirect.path(), "/oauth2/callback");
        assert_eq!(config.proxy_prefix, "/auth");
        assert!(config.reverse_proxy);
    }

    #[tokio::test]
    async fn test_empty_configuration_reports_every_missing_setting() {
        let err = run(&Options::default()).await.unwrap_err();
        let errors = err.validation_errors().unwrap();

        assert!(errors.len() >= 3);
        assert!(errors.has_setting("cookie-secret"));
        assert!(errors.has_setting("client-id"));
        assert!(errors.has_setting("email-domain"));
        assert!(err.to_string().starts_with("invalid configuration:\n  "));
    }

    #[tokio::test]
    async fn test_login_gov_needs_no_client_secret() {
        let mut opts = valid_options();
        opts.provider = "login.gov".to_string();
        opts.client_secret.clear();
        opts.jwt_key = include_str!("../../tests/fixtures/rsa_key.pem").to_string();

        let config = run(&opts).await.unwrap();
        assert!(config.provider.binding.capabilities().jwt_signing);
    }

    #[tokio::test]
    async fn test_unreadable_client_secret_file() {
        let mut opts = valid_options();
        opts.client_secret.clear();
        opts.client_secret_file = "/nonexistent/secret".to_string();

        let err = run(&opts).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(
            errors.iter().next().unwrap().message,
            "could not read client secret file: /nonexistent/secret"
        );
    }

    #[tokio::test]
    async fn test_google_trio() {
        let mut opts = valid_options();
        opts.google_admin_email = "admin@example.com".to_string();

        let err = run(&opts).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has_setting("google-group"));
        assert!(errors.has_setting("google-service-account-json"));
        assert!(!errors.has_setting("google-admin-email"));
    }

    #[tokio::test]
    async fn test_header_flags() {
        let mut opts = valid_options();
        opts.set_basic_auth = true;
        opts.set_authorization_header = true;

        let err = run(&opts).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has_kind(ErrorKind::MutuallyExclusive));

        let mut opts = valid_options();
        opts.prefer_email_to_user = true;
        opts.pass_basic_auth = false;
        opts.pass_user_headers = false;
        let err = run(&opts).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has_setting("prefer-email-to-user"));
    }

    #[tokio::test]
    async fn test_errors_accumulate_across_checks() {
        let mut opts = valid_options();
        opts.redirect_url = "::bad".to_string();
        opts.skip_auth_regex = vec!["(".to_string()];
        opts.signature_key = "bogus:abc".to_string();
        opts.cookie.same_site = "sideways".to_string();
        opts.session.kind = "memcached".to_string();

        let err = run(&opts).await.unwrap_err();
        let errors = err.validation_errors().unwrap();

        assert_eq!(errors.len(), 5);
        assert!(errors.has_setting("redirect-url"));
        assert!(errors.has_setting("skip-auth-regex"));
        assert!(errors.has_setting("signature-key"));
        assert!(errors.has_setting("cookie-samesite"));
        assert!(errors.has_kind(ErrorKind::Session));
    }

    #[tokio::test]
    async fn test_signature_and_cipher_published() {
        let mut opts = valid_options();
        opts.signature_key = "sha256:shared".to_string();
        opts.pass_access_token = true;
        opts.skip_auth_header = vec!["^X-Internal$".to_string()];

        let config = run(&opts).await.unwrap();

        assert_eq!(config.signature.unwrap().secret, "shared");
        assert_eq!(config.cipher.unwrap().key_bits(), 128);
        assert!(config.session_store.settings().cipher.is_some());
        assert!(config.skip_auth_header[0].is_match("X-Internal"));
    }
}
