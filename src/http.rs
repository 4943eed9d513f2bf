//! Outbound HTTP client for discovery and key-set fetches.
//!
//! The client is an explicit value passed to every collaborator that talks to an
//! issuer. Disabling certificate verification affects only the client built here
//! and every verifier holding a clone of it, for as long as those values live.
//! Nothing process-wide is modified.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::options::Options;

/// Settings for [`build_client`].
#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    /// Accept invalid TLS certificates.
    pub insecure_skip_verify: bool,
    /// Total timeout for a single request.
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            insecure_skip_verify: false,
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSettings {
    /// Settings derived from the gateway options.
    pub fn from_options(opts: &Options) -> Self {
        Self {
            insecure_skip_verify: opts.ssl_insecure_skip_verify,
            timeout: opts.discovery_timeout(),
        }
    }
}

/// Build the HTTP client used for discovery and JWKS requests.
pub fn build_client(settings: HttpSettings) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(settings.timeout);

    if settings.insecure_skip_verify {
        tracing::warn!(
            "TLS certificate verification is disabled for issuer discovery and key-set requests"
        );
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))
}
