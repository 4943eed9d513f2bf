//! Integration tests for the validation pass over whole configurations.
//!
//! None of these reach the network: no issuer is configured, so only the
//! local checks run.

use authgate::error::ErrorKind;
use authgate::options::{CookieOptions, SessionOptions};
use authgate::session::{SessionError, SessionStoreFactory, SessionStoreHandle};
use authgate::validation::cookie::{secret_bytes, CookieSettings};
use authgate::{Error, Options, ProviderKind, SymmetricCipher, ValidationErrors, Validator};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const RSA_KEY: &str = include_str!("fixtures/rsa_key.pem");

fn valid_options() -> Options {
    Options {
        client_id: "gateway".to_string(),
        client_secret: "secret".to_string(),
        email_domains: vec!["*".to_string()],
        upstreams: vec!["http://127.0.0.1:8080".to_string()],
        cookie: CookieOptions {
            secret: "cookie.secret.16".to_string(),
            ..CookieOptions::default()
        },
        ..Options::default()
    }
}

async fn validate(opts: &Options) -> authgate::Result<authgate::ValidatedConfiguration> {
    Validator::with_http_client(reqwest::Client::new()).validate(opts).await
}

fn errors_of(err: &Error) -> &ValidationErrors {
    err.validation_errors().expect("expected accumulated validation errors")
}

#[tokio::test]
async fn test_toml_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
provider = "github"
github_org = "acme"
client_id = "gateway"
client_secret = "secret"
email_domains = ["acme.io"]
upstreams = ["http://127.0.0.1:8080/app"]
skip_auth_regex = ["^/healthz$"]
signature_key = "sha256:upstream-secret"

[cookie]
secret = "cookie.secret.16"
domains = ["acme.io", "auth.acme.io"]
same_site = "lax"

[logging]
exclude_logging_paths = "/metrics"
silence_ping_logging = true
"#
    )
    .unwrap();

    let opts = Options::from_file(file.path()).unwrap();
    let config = validate(&opts).await.unwrap();

    assert_eq!(config.provider.kind(), ProviderKind::GitHub);
    assert_eq!(config.upstreams[0].path(), "/app");
    assert!(config.skip_auth_regex[0].is_match("/healthz"));
    assert_eq!(config.signature.unwrap().secret, "upstream-secret");
    assert_eq!(config.cookie.domains, vec!["auth.acme.io", "acme.io"]);
    assert_eq!(config.logging.exclude_paths, vec!["/metrics", "/ping"]);
}

#[tokio::test]
async fn test_zero_settings_reports_at_least_three_errors() {
    let err = validate(&Options::default()).await.unwrap_err();
    let errors = errors_of(&err);

    assert!(errors.len() >= 3, "{}", err);
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    assert!(messages.contains(&"missing setting: cookie-secret"));
    assert!(messages.contains(&"missing setting: client-id"));
    assert!(messages.contains(&"missing setting: client-secret or client-secret-file"));
    assert!(messages.contains(
        &"missing setting for email validation: email-domain or authenticated-emails-file required."
    ));
}

#[tokio::test]
async fn test_basic_auth_and_authorization_header_always_conflict() {
    let variants = [valid_options(), Options::default()];
    for mut opts in variants {
        opts.set_basic_auth = true;
        opts.set_authorization_header = true;

        let err = validate(&opts).await.unwrap_err();
        assert!(errors_of(&err).has_kind(ErrorKind::MutuallyExclusive));
    }
}

#[tokio::test]
async fn test_login_gov_key_matrix() {
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(RSA_KEY.as_bytes()).unwrap();
    let key_path = key_file.path().display().to_string();

    let login_gov = |jwt_key: &str, jwt_key_file: &str| Options {
        provider: "login.gov".to_string(),
        client_secret: String::new(),
        jwt_key: jwt_key.to_string(),
        jwt_key_file: jwt_key_file.to_string(),
        ..valid_options()
    };

    assert!(validate(&login_gov(RSA_KEY, &key_path)).await.is_err());
    assert!(validate(&login_gov("", "")).await.is_err());
    assert!(validate(&login_gov(RSA_KEY, "")).await.is_ok());
    assert!(validate(&login_gov("", &key_path)).await.is_ok());

    let err = validate(&login_gov("", "/nonexistent/key.pem")).await.unwrap_err();
    assert_eq!(
        errors_of(&err).iter().next().unwrap().message,
        "could not read key file: /nonexistent/key.pem"
    );
}

#[tokio::test]
async fn test_cookie_refresh_against_expire() {
    let mut opts = valid_options();
    opts.cookie.refresh_secs = 0;
    assert!(validate(&opts).await.is_ok());

    // A non-zero refresh needs a cipher, so use a 32-byte secret.
    opts.cookie.secret = URL_SAFE.encode([42u8; 32]);
    opts.cookie.refresh_secs = 200 * 3600;
    let err = validate(&opts).await.unwrap_err();
    assert_eq!(
        errors_of(&err).iter().next().unwrap().message,
        "cookie_refresh (200h0m0s) must be less than cookie_expire (168h0m0s)"
    );

    opts.cookie.refresh_secs = 3600;
    let config = validate(&opts).await.unwrap();
    assert_eq!(config.cipher.unwrap().key_bits(), 256);
}

#[tokio::test]
async fn test_cipher_length_follows_effective_secret() {
    for len in [16usize, 24, 32] {
        let raw: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
        let encoded = URL_SAFE.encode(&raw);
        assert_eq!(secret_bytes(&encoded), raw);

        let mut opts = valid_options();
        opts.pass_access_token = true;
        opts.cookie.secret = encoded;
        let config = validate(&opts).await.unwrap();
        assert_eq!(config.cipher.unwrap().key_bits(), len * 8);
    }

    for len in [8usize, 17, 31, 33] {
        let mut opts = valid_options();
        opts.pass_access_token = true;
        opts.cookie.secret = "!".repeat(len);

        let err = validate(&opts).await.unwrap_err();
        let message = &errors_of(&err).iter().next().unwrap().message;
        assert!(message.contains(&format!("but is {} bytes.", len)), "{}", message);
    }
}

#[tokio::test]
async fn test_unsupported_provider_does_not_hide_other_errors() {
    let mut opts = valid_options();
    opts.provider = "myspace".to_string();
    opts.upstreams = vec!["::nope".to_string()];
    opts.signature_key = "sha256".to_string();

    let err = validate(&opts).await.unwrap_err();
    let errors = errors_of(&err);

    assert_eq!(errors.len(), 3);
    assert!(errors.has_kind(ErrorKind::Unsupported));
    assert!(errors.has_setting("upstream"));
    assert!(errors.has_setting("signature-key"));
}

#[tokio::test]
async fn test_redis_session_store_errors_are_wrapped() {
    let mut opts = valid_options();
    opts.session = SessionOptions {
        kind: "redis".to_string(),
        ..SessionOptions::default()
    };

    let err = validate(&opts).await.unwrap_err();
    assert_eq!(
        errors_of(&err).iter().next().unwrap().message,
        "error initialising session storage: redis connection URL is required"
    );

    opts.session.redis.connection_url = "redis://cache:6379".to_string();
    let config = validate(&opts).await.unwrap();
    assert_eq!(config.session_store.kind(), "redis");
}

struct CountingFactory {
    calls: AtomicUsize,
}

impl SessionStoreFactory for CountingFactory {
    fn build(
        &self,
        _opts: &SessionOptions,
        cookie: &CookieSettings,
        cipher: Option<&SymmetricCipher>,
    ) -> Result<SessionStoreHandle, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SessionStoreHandle::Cookie(authgate::session::StoreSettings {
            cookie: cookie.clone(),
            cipher: cipher.cloned(),
        }))
    }
}

#[tokio::test]
async fn test_custom_session_factory() {
    let factory = Arc::new(CountingFactory {
        calls: AtomicUsize::new(0),
    });
    let mut opts = valid_options();
    opts.session.kind = "dynamo".to_string();

    let config = Validator::with_http_client(reqwest::Client::new())
        .with_session_factory(factory.clone())
        .validate(&opts)
        .await
        .unwrap();

    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    assert_eq!(config.session_store.settings().cookie.name, "_oauth2_proxy");
}
