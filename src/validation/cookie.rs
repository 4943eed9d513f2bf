//! Cookie secret decoding and cookie policy checks.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use std::fmt;
use std::time::Duration;

use crate::cipher::{SymmetricCipher, VALID_KEY_LENGTHS};
use crate::error::{ConfigError, ErrorKind, ValidationErrors};
use crate::options::{CookieOptions, Options};

/// URL-safe, padded base64 that tolerates non-zero trailing bits.
const SECRET_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical),
);

/// Pad `secret` with `=` to a multiple of four characters.
pub fn add_padding(secret: &str) -> String {
    match secret.len() % 4 {
        1 => format!("{}===", secret),
        2 => format!("{}==", secret),
        3 => format!("{}=", secret),
        _ => secret.to_string(),
    }
}

/// Effective secret bytes.
///
/// The padded secret is decoded as URL-safe base64; on success the decoded
/// bytes (padded the same way) are the secret, otherwise the literal bytes are.
pub fn secret_bytes(secret: &str) -> Vec<u8> {
    match SECRET_ENGINE.decode(add_padding(secret)) {
        Ok(decoded) => {
            let mut bytes = decoded;
            let pad = match bytes.len() % 4 {
                0 => 0,
                rem => 4 - rem,
            };
            // One leftover byte gets three `=`, matching `add_padding`.
            bytes.extend(std::iter::repeat_n(b'=', pad));
            bytes
        },
        Err(_) => secret.as_bytes().to_vec(),
    }
}

/// Whether the session layer must encrypt cookie contents.
pub fn requires_cipher(opts: &Options) -> bool {
    opts.pass_access_token
        || opts.set_authorization_header
        || opts.pass_authorization_header
        || opts.cookie.refresh_secs != 0
}

/// Build the cookie cipher when one is required.
pub fn build_cipher(opts: &Options, errors: &mut ValidationErrors) -> Option<SymmetricCipher> {
    if !requires_cipher(opts) {
        return None;
    }

    let secret = opts.cookie.secret.as_str();
    let bytes = secret_bytes(secret);
    if !VALID_KEY_LENGTHS.contains(&bytes.len()) {
        let suffix = if bytes != secret.as_bytes() {
            format!(" note: cookie secret was base64 decoded from {:?}", secret)
        } else {
            String::new()
        };
        errors.push(ConfigError::new(
            "cookie-secret",
            ErrorKind::InvalidLength,
            format!(
                "cookie_secret must be 16, 24, or 32 bytes to create an AES cipher when \
                 pass_access_token == true or cookie_refresh != 0, but is {} bytes.{}",
                bytes.len(),
                suffix
            ),
        ));
        return None;
    }

    match SymmetricCipher::new(&bytes) {
        Ok(cipher) => Some(cipher),
        Err(err) => {
            errors.push(ConfigError::new(
                "cookie-secret",
                ErrorKind::InvalidLength,
                format!("cookie-secret error: {}", err),
            ));
            None
        },
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SameSite {
    /// Attribute omitted.
    #[default]
    Unset,
    /// `SameSite=Lax`.
    Lax,
    /// `SameSite=Strict`.
    Strict,
    /// `SameSite=None`.
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unset => "",
            Self::Lax => "lax",
            Self::Strict => "strict",
            Self::None => "none",
        })
    }
}

/// Cookie policy after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,
    /// Domains, longest first.
    pub domains: Vec<String>,
    /// Cookie path.
    pub path: String,
    /// Cookie lifetime.
    pub expire: Duration,
    /// Refresh interval; zero disables refresh.
    pub refresh: Duration,
    /// `Secure` attribute.
    pub secure: bool,
    /// `HttpOnly` attribute.
    pub http_only: bool,
    /// `SameSite` attribute.
    pub same_site: SameSite,
}

/// Check the cookie policy and return the normalized settings.
pub fn validate_cookie(cookie: &CookieOptions, errors: &mut ValidationErrors) -> CookieSettings {
    if !is_valid_cookie_name(&cookie.name) {
        errors.push(ConfigError::malformed(
            "cookie-name",
            format!("invalid cookie name: {:?}", cookie.name),
        ));
    }

    if cookie.refresh() >= cookie.expire() {
        errors.push(ConfigError::new(
            "cookie-refresh",
            ErrorKind::Conflict,
            format!(
                "cookie_refresh ({}) must be less than cookie_expire ({})",
                format_duration(cookie.refresh()),
                format_duration(cookie.expire())
            ),
        ));
    }

    let same_site = match cookie.same_site.as_str() {
        "" => SameSite::Unset,
        "lax" => SameSite::Lax,
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        other => {
            errors.push(ConfigError::new(
                "cookie-samesite",
                ErrorKind::Unsupported,
                format!("cookie_samesite ({}) must be one of ['', 'lax', 'strict', 'none']", other),
            ));
            SameSite::Unset
        },
    };

    let mut domains = cookie.domains.clone();
    domains.sort_by(|a, b| b.len().cmp(&a.len()));

    CookieSettings {
        name: cookie.name.clone(),
        domains,
        path: cookie.path.clone(),
        expire: cookie.expire(),
        refresh: cookie.refresh(),
        secure: cookie.secure,
        http_only: cookie.http_only,
        same_site,
    }
}

/// RFC 7230 token: non-empty, visible ASCII without separators.
fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Format like `168h0m0s`, `1m30s` or `0s`.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
