//! Raw gateway configuration.
//!
//! [`Options`] is the flat record handed to the validator. It is assembled by an
//! external loader (flags, environment, file) and is never mutated by the
//! validation pass; everything derived from it lands in
//! [`ValidatedConfiguration`](crate::ValidatedConfiguration).
//!
//! # Example Configuration File
//!
//! ```toml
//! provider = "oidc"
//! client_id = "gateway"
//! client_secret = "s3cr3t"
//! oidc_issuer_url = "https://accounts.example.com"
//! redirect_url = "https://gateway.example.com/oauth2/callback"
//! upstreams = ["http://127.0.0.1:8080/"]
//! email_domains = ["example.com"]
//!
//! [cookie]
//! secret = "Q2hhbmdlTWVDaGFuZ2VNZUNoYW5nZU1lQ2hhbmdlTWU="
//! refresh_secs = 3600
//!
//! [session]
//! type = "cookie"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Gateway configuration as supplied by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Path prefix for the gateway's own endpoints.
    pub proxy_prefix: String,
    /// Health-check path.
    pub ping_path: String,
    /// Whether the gateway runs behind another reverse proxy.
    pub reverse_proxy: bool,

    /// OAuth callback URL.
    pub redirect_url: String,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// File holding the OAuth client secret.
    pub client_secret_file: String,

    /// File of allowed email addresses.
    pub authenticated_emails_file: String,
    /// Allowed email domains (`*` allows all).
    pub email_domains: Vec<String>,
    /// htpasswd file for basic authentication.
    pub htpasswd_file: String,

    /// Keycloak group restriction.
    pub keycloak_group: String,
    /// Azure tenant.
    pub azure_tenant: String,
    /// Bitbucket team restriction.
    pub bitbucket_team: String,
    /// Bitbucket repository restriction.
    pub bitbucket_repository: String,
    /// GitHub organization restriction.
    pub github_org: String,
    /// GitHub team restriction.
    pub github_team: String,
    /// GitLab group restriction.
    pub gitlab_group: String,
    /// Google groups restriction.
    pub google_groups: Vec<String>,
    /// Google admin email used for directory impersonation.
    pub google_admin_email: String,
    /// Path to the Google service account credentials.
    pub google_service_account_json: String,

    /// Cookie settings.
    pub cookie: CookieOptions,
    /// Session storage settings.
    pub session: SessionOptions,

    /// Upstream URLs to proxy to.
    pub upstreams: Vec<String>,
    /// Path patterns that bypass authentication.
    pub skip_auth_regex: Vec<String>,
    /// Header patterns that bypass authentication.
    pub skip_auth_header: Vec<String>,
    /// Accept pre-issued bearer tokens instead of the session flow.
    pub skip_jwt_bearer_tokens: bool,
    /// Extra trusted issuers as `issuer=audience`.
    pub extra_jwt_issuers: Vec<String>,

    /// Forward basic-auth credentials upstream.
    pub pass_basic_auth: bool,
    /// Set a basic-auth header on the response.
    pub set_basic_auth: bool,
    /// Prefer the email over the user name in forwarded identity.
    pub prefer_email_to_user: bool,
    /// Forward the access token upstream.
    pub pass_access_token: bool,
    /// Forward user headers upstream.
    pub pass_user_headers: bool,
    /// Set an `Authorization` header on the response.
    pub set_authorization_header: bool,
    /// Forward the ID token as an `Authorization` header upstream.
    pub pass_authorization_header: bool,
    /// Disable TLS certificate verification for outbound discovery calls.
    pub ssl_insecure_skip_verify: bool,

    /// Provider kind (`google`, `azure`, `github`, `oidc`, ...).
    pub provider: String,
    /// Provider display name.
    pub provider_display_name: String,
    /// OIDC issuer URL.
    pub oidc_issuer_url: String,
    /// Accept tokens whose email claim is not verified.
    pub insecure_oidc_allow_unverified_email: bool,
    /// Do not check the `iss` claim against the issuer URL.
    pub insecure_oidc_skip_issuer_verification: bool,
    /// Use explicit endpoints instead of the discovery document.
    pub skip_oidc_discovery: bool,
    /// JWKS URL used when discovery is skipped.
    pub oidc_jwks_url: String,
    /// Authorization endpoint.
    pub login_url: String,
    /// Token endpoint.
    pub redeem_url: String,
    /// Profile (userinfo) endpoint.
    pub profile_url: String,
    /// Protected resource (Azure).
    #[serde(rename = "resource")]
    pub protected_resource: String,
    /// Access token validation endpoint.
    pub validate_url: String,
    /// OAuth scope.
    pub scope: String,
    /// OIDC prompt.
    pub prompt: String,
    /// OAuth approval prompt.
    pub approval_prompt: String,
    /// Claim used as the user id.
    pub user_id_claim: String,
    /// OIDC acr values.
    pub acr_values: String,

    /// Inline PEM private key used to sign client assertions (login.gov).
    pub jwt_key: String,
    /// File holding the PEM private key (login.gov).
    pub jwt_key_file: String,
    /// Public JWK URL (login.gov).
    pub pubjwk_url: String,

    /// Upstream request signing key as `algorithm:secret`.
    pub signature_key: String,

    /// Per-request timeout for discovery and key-set calls, in seconds.
    pub discovery_timeout_secs: u64,

    /// Logging settings.
    pub logging: LoggingOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            proxy_prefix: "/oauth2".to_string(),
            ping_path: "/ping".to_string(),
            reverse_proxy: false,
            redirect_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            client_secret_file: String::new(),
            authenticated_emails_file: String::new(),
            email_domains: Vec::new(),
            htpasswd_file: String::new(),
            keycloak_group: String::new(),
            azure_tenant: String::new(),
            bitbucket_team: String::new(),
            bitbucket_repository: String::new(),
            github_org: String::new(),
            github_team: String::new(),
            gitlab_group: String::new(),
            google_groups: Vec::new(),
            google_admin_email: String::new(),
            google_service_account_json: String::new(),
            cookie: CookieOptions::default(),
            session: SessionOptions::default(),
            upstreams: Vec::new(),
            skip_auth_regex: Vec::new(),
            skip_auth_header: Vec::new(),
            skip_jwt_bearer_tokens: false,
            extra_jwt_issuers: Vec::new(),
            pass_basic_auth: true,
            set_basic_auth: false,
            prefer_email_to_user: false,
            pass_access_token: false,
            pass_user_headers: true,
            set_authorization_header: false,
            pass_authorization_header: false,
            ssl_insecure_skip_verify: false,
            provider: "google".to_string(),
            provider_display_name: String::new(),
            oidc_issuer_url: String::new(),
            insecure_oidc_allow_unverified_email: false,
            insecure_oidc_skip_issuer_verification: false,
            skip_oidc_discovery: false,
            oidc_jwks_url: String::new(),
            login_url: String::new(),
            redeem_url: String::new(),
            profile_url: String::new(),
            protected_resource: String::new(),
            validate_url: String::new(),
            scope: String::new(),
            prompt: String::new(),
            approval_prompt: "force".to_string(),
            user_id_claim: "email".to_string(),
            acr_values: String::new(),
            jwt_key: String::new(),
            jwt_key_file: String::new(),
            pubjwk_url: String::new(),
            signature_key: String::new(),
            discovery_timeout_secs: default_discovery_timeout(),
            logging: LoggingOptions::default(),
        }
    }
}

impl Options {
    /// Load options from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse options from a TOML string. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Discovery timeout as a `Duration`.
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    /// Whether the configured provider is login.gov.
    pub fn is_login_gov(&self) -> bool {
        self.provider == "login.gov"
    }
}

/// Cookie settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    /// Cookie name.
    pub name: String,
    /// Seed secret, literal or URL-safe base64.
    pub secret: String,
    /// Cookie domains.
    pub domains: Vec<String>,
    /// Cookie path.
    pub path: String,
    /// Cookie lifetime in seconds.
    pub expire_secs: u64,
    /// Session refresh interval in seconds (0 disables refresh).
    pub refresh_secs: u64,
    /// Set the `Secure` attribute.
    pub secure: bool,
    /// Set the `HttpOnly` attribute.
    pub http_only: bool,
    /// `SameSite` attribute: empty, `lax`, `strict` or `none`.
    pub same_site: String,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "_oauth2_proxy".to_string(),
            secret: String::new(),
            domains: Vec::new(),
            path: "/".to_string(),
            expire_secs: 168 * 3600,
            refresh_secs: 0,
            secure: true,
            http_only: true,
            same_site: String::new(),
        }
    }
}

impl CookieOptions {
    /// Cookie lifetime.
    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }

    /// Session refresh interval.
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Store type: `cookie` or `redis`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Redis settings, used when `kind` is `redis`.
    pub redis: RedisOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            kind: "cookie".to_string(),
            redis: RedisOptions::default(),
        }
    }
}

/// Redis session store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisOptions {
    /// Connection URL for a single Redis instance.
    pub connection_url: String,
    /// Connect through Redis Sentinel.
    pub use_sentinel: bool,
    /// Sentinel master name.
    pub sentinel_master_name: String,
    /// Sentinel connection URLs.
    pub sentinel_connection_urls: Vec<String>,
    /// Connect to a Redis Cluster.
    pub use_cluster: bool,
    /// Cluster connection URLs.
    pub cluster_connection_urls: Vec<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Log file; stderr when empty.
    pub filename: String,
    /// Use local time instead of UTC in log timestamps.
    pub local_time: bool,
    /// Enable standard logging.
    pub standard_logging: bool,
    /// Enable request logging.
    pub request_logging: bool,
    /// Enable authentication logging.
    pub auth_logging: bool,
    /// Comma-separated paths excluded from request logging.
    pub exclude_logging_paths: String,
    /// Exclude the ping path from request logging.
    pub silence_ping_logging: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            filename: String::new(),
            local_time: true,
            standard_logging: true,
            request_logging: true,
            auth_logging: true,
            exclude_logging_paths: String::new(),
            silence_ping_logging: false,
        }
    }
}

fn default_discovery_timeout() -> u64 {
    10 // 10 seconds
}
