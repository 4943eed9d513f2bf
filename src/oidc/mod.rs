//! OIDC issuer discovery and token verifiers.
//!
//! - [`discovery`] fetches `.well-known/openid-configuration` documents.
//! - [`verifier`] holds [`TokenVerifier`] and its cached [`RemoteKeySet`].
//! - [`builder`] resolves the primary issuer (discovery, explicit or probe).
//! - [`issuers`] expands `issuer=audience` entries for bearer-token mode.

pub mod builder;
pub mod discovery;
pub mod issuers;
pub mod verifier;

pub use builder::{OidcBuilder, OidcResolution, ResolutionMode, ResolvedEndpoints, DEFAULT_OIDC_SCOPE};
pub use discovery::{discover, fetch_discovery_doc, OidcDiscovery};
pub use issuers::{parse_jwt_issuers, resolve_bearer_verifiers, verifier_for_issuer, IssuerBinding};
pub use verifier::{RemoteKeySet, TokenVerifier, VerifiedToken, VerifierSource, VerifyError};
