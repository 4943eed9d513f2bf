//! URL and pattern parsing helpers.
//!
//! Every helper records failures on the shared error list and keeps going, so
//! one bad entry never hides the next.

use regex::Regex;
use std::fmt;
use url::{ParseError, Url};

use crate::error::{ConfigError, ValidationErrors};

/// Parse an optional endpoint URL.
///
/// An empty value means "absent" and yields `None` without an error. The
/// setting recorded on failure is `<role>-url`.
pub fn parse_url(value: &str, role: &str, errors: &mut ValidationErrors) -> Option<Url> {
    if value.is_empty() {
        return None;
    }
    match Url::parse(value) {
        Ok(url) => Some(url),
        Err(err) => {
            errors.push(ConfigError::malformed(
                format!("{}-url", role),
                format!("error parsing {}-url={:?} {}", role, value, err),
            ));
            None
        },
    }
}

/// OAuth callback location.
///
/// A path-only value leaves the scheme and host to be taken from each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectUrl {
    /// A fully qualified callback URL.
    Absolute(Url),
    /// A path (with optional query) resolved against the request host.
    Relative(String),
}

impl RedirectUrl {
    /// The callback path.
    pub fn path(&self) -> &str {
        match self {
            Self::Absolute(url) => url.path(),
            Self::Relative(path) => path.split(['?', '#']).next().unwrap_or_default(),
        }
    }

    /// Whether scheme and host come from the request.
    pub fn is_relative(&self) -> bool {
        matches!(self, Self::Relative(_))
    }
}

impl fmt::Display for RedirectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(url) => f.write_str(url.as_str()),
            Self::Relative(path) => f.write_str(path),
        }
    }
}

/// Parse the redirect URL, accepting either an absolute URL or an
/// absolute path such as `/oauth2/callback`.
pub fn parse_redirect_url(value: &str, errors: &mut ValidationErrors) -> Option<RedirectUrl> {
    if value.is_empty() {
        return None;
    }
    let parsed = match Url::parse(value) {
        Ok(url) => Ok(RedirectUrl::Absolute(url)),
        Err(ParseError::RelativeUrlWithoutBase) if value.starts_with('/') && !value.starts_with("//") => {
            Url::parse("http://localhost/")
                .and_then(|base| base.join(value))
                .map(|_| RedirectUrl::Relative(value.to_string()))
        },
        Err(err) => Err(err),
    };
    match parsed {
        Ok(redirect) => Some(redirect),
        Err(err) => {
            errors.push(ConfigError::malformed(
                "redirect-url",
                format!("error parsing redirect-url={:?} {}", value, err),
            ));
            None
        },
    }
}

/// Parse upstream URLs. An upstream with an empty path is normalized to `/`.
pub fn parse_upstreams(values: &[String], errors: &mut ValidationErrors) -> Vec<Url> {
    let mut upstreams = Vec::with_capacity(values.len());
    for value in values {
        match Url::parse(value) {
            Ok(mut url) => {
                if url.path().is_empty() {
                    url.set_path("/");
                }
                upstreams.push(url);
            },
            Err(err) => errors.push(ConfigError::malformed(
                "upstream",
                format!("error parsing upstream: {}", err),
            )),
        }
    }
    upstreams
}

/// Compile every pattern of `setting`.
pub fn compile_patterns(patterns: &[String], setting: &str, errors: &mut ValidationErrors) -> Vec<Regex> {
    let mut compiled = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        match Regex::new(pattern) {
            Ok(regex) => compiled.push(regex),
            Err(err) => errors.push(ConfigError::malformed(
                setting,
                format!("error compiling regex={:?} {}", pattern, err),
            )),
        }
    }
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_empty_url_is_absent() {
        let mut errors = ValidationErrors::new();
        assert!(parse_url("", "login", &mut errors).is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_bad_url_names_role() {
        let mut errors = ValidationErrors::new();
        assert!(parse_url("not a url", "redeem", &mut errors).is_none());

        let err = errors.iter().next().unwrap();
        assert_eq!(err.setting, "redeem-url");
        assert_eq!(err.kind, ErrorKind::Malformed);
        assert!(err.message.starts_with("error parsing redeem-url=\"not a url\""));
    }

    #[test]
    fn test_redirect_url_accepts_path_only() {
        let mut errors = ValidationErrors::new();

        let relative = parse_redirect_url("/oauth2/callback", &mut errors).unwrap();
        assert!(relative.is_relative());
        assert_eq!(relative.path(), "/oauth2/callback");
        assert_eq!(relative.to_string(), "/oauth2/callback");

        let absolute = parse_redirect_url("https://gateway.example.com/oauth2/callback?x=1", &mut errors).unwrap();
        assert!(!absolute.is_relative());
        assert_eq!(absolute.path(), "/oauth2/callback");

        assert!(errors.is_empty());
    }

    #[test]
    fn test_redirect_url_rejects_bare_words() {
        let mut errors = ValidationErrors::new();
        assert!(parse_redirect_url("::bad", &mut errors).is_none());
        assert!(parse_redirect_url("callback", &mut errors).is_none());

        assert_eq!(errors.len(), 2);
        assert!(errors.has_setting("redirect-url"));
    }

    #[test]
    fn test_upstreams() {
        let mut errors = ValidationErrors::new();
        let values = vec![
            "http://127.0.0.1:8080".to_string(),
            "http://backend/app/".to_string(),
            "::bad::".to_string(),
        ];

        let upstreams = parse_upstreams(&values, &mut errors);

        assert_eq!(upstreams.len(), 2);
        assert_eq!(upstreams[0].path(), "/");
        assert_eq!(upstreams[1].path(), "/app/");
        assert_eq!(errors.len(), 1);
        assert!(errors.iter().next().unwrap().message.starts_with("error parsing upstream: "));
    }

    #[test]
    fn test_compile_patterns() {
        let mut errors = ValidationErrors::new();
        let patterns = vec!["^/health$".to_string(), "([a-z".to_string()];

        let compiled = compile_patterns(&patterns, "skip-auth-regex", &mut errors);

        assert_eq!(compiled.len(), 1);
        assert!(compiled[0].is_match("/health"));
        assert!(errors.has_setting("skip-auth-regex"));
        assert!(errors.iter().next().unwrap().message.contains("\"([a-z\""));
    }
}
