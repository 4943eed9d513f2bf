//! Error types for configuration validation.
//!
//! Validation distinguishes two categories of failure:
//!
//! - **Accumulable** failures are collected as [`ConfigError`] records in a
//!   [`ValidationErrors`] list. Every check runs, so an operator sees the full
//!   defect list for one attempt.
//! - **Fatal** failures abort the pass immediately. The only fatal failure is a
//!   primary issuer that cannot be bootstrapped in discovery mode
//!   ([`Error::Discovery`]).

use std::fmt;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by the validation pass.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more settings are invalid.
    #[error("{0}")]
    Invalid(ValidationErrors),

    /// The primary OIDC issuer could not be bootstrapped.
    #[error("OIDC discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The HTTP client used for discovery could not be built.
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// The configuration source could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Accumulated validation errors, if this is an [`Error::Invalid`].
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML parse error: {}", err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Failure to resolve an issuer through its discovery document or key set.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The issuer (or derived) URL is not a valid URL.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The request could not be sent or timed out.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Requested URL.
        url: String,
        /// Transport message.
        reason: String,
    },

    /// The endpoint answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("failed to parse response from {url}: {reason}")]
    Parse {
        /// Requested URL.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// The discovery document names a different issuer than the one configured.
    #[error("issuer did not match the issuer returned by provider, expected {expected:?} got {actual:?}")]
    IssuerMismatch {
        /// Configured issuer.
        expected: String,
        /// Issuer found in the document.
        actual: String,
    },
}

/// Category of an accumulable configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required setting was not supplied.
    Missing,
    /// A setting could not be parsed (URL, regex, spec string, PEM).
    Malformed,
    /// Two settings that exclude each other are both set.
    MutuallyExclusive,
    /// A setting names a value outside the supported set.
    Unsupported,
    /// A secret or key has the wrong length.
    InvalidLength,
    /// A referenced file could not be read or written.
    Unreadable,
    /// Two settings are individually valid but inconsistent.
    Conflict,
    /// A provider-specific binding step failed.
    Provider,
    /// The session store could not be constructed.
    Session,
}

/// A single accumulable configuration error.
///
/// `setting` names the violated option using its flag name, `kind` classifies the
/// failure and `message` is the operator-facing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Flag name of the violated setting.
    pub setting: String,
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl ConfigError {
    /// Create an error with an explicit message.
    pub fn new(setting: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
            kind,
            message: message.into(),
        }
    }

    /// `missing setting: <setting>`.
    pub fn missing(setting: impl Into<String>) -> Self {
        let setting = setting.into();
        let message = format!("missing setting: {}", setting);
        Self::new(setting, ErrorKind::Missing, message)
    }

    /// A malformed value for `setting`.
    pub fn malformed(setting: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(setting, ErrorKind::Malformed, message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Ordered list of accumulated configuration errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ConfigError>,
}

impl ValidationErrors {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error.
    pub fn push(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    /// Whether no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the recorded errors.
    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.errors.iter()
    }

    /// Whether any error was recorded against `setting`.
    pub fn has_setting(&self, setting: &str) -> bool {
        self.errors.iter().any(|e| e.setting == setting)
    }

    /// Whether any error of `kind` was recorded.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// Turn the list into `Ok(value)` when empty, [`Error::Invalid`] otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(Error::Invalid(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid configuration:")?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ConfigError;
    type IntoIter = std::slice::Iter<'a, ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl From<ConfigError> for ValidationErrors {
    fn from(error: ConfigError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}
