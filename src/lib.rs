//! # authgate
//!
//! Startup configuration validation and identity-provider binding for an
//! OAuth2/OIDC authentication gateway.
//!
//! One pass over a raw [`Options`] value produces either a complete
//! [`ValidatedConfiguration`] (compiled skip patterns, parsed upstreams, a bound
//! [`Provider`], token verifiers, cookie cipher and session store) or every
//! configuration defect found, reported together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authgate::{Options, Validator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let opts = Options::from_toml(r#"
//!         provider = "oidc"
//!         oidc_issuer_url = "https://accounts.example.com"
//!         client_id = "gateway"
//!         client_secret = "s3cret"
//!         email_domains = ["example.com"]
//!         upstreams = ["http://127.0.0.1:8080"]
//!
//!         [cookie]
//!         secret = "0123456789abcdef0123456789abcdef"
//!     "#)?;
//!
//!     match Validator::from_options(&opts)?.validate(&opts).await {
//!         Ok(config) => println!("ready: {}", config.provider.data.display_name),
//!         Err(err) => eprintln!("{}", err),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`options`]: the raw configuration record and its TOML loader
//! - [`validation`]: the orchestrator plus URL, cookie and signature checks
//! - [`oidc`]: issuer discovery, token verifiers and extra bearer issuers
//! - [`providers`]: provider kinds and their bindings
//! - [`session`]: session store factory seam
//! - [`cipher`]: AES-GCM cookie cipher

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cipher;
pub mod error;
pub mod http;
pub mod logging;
pub mod oidc;
pub mod options;
pub mod providers;
pub mod session;
pub mod validation;

pub use cipher::SymmetricCipher;
pub use error::{ConfigError, DiscoveryError, Error, ErrorKind, Result, ValidationErrors};
pub use oidc::{TokenVerifier, VerifiedToken};
pub use options::Options;
pub use providers::{Provider, ProviderBinding, ProviderKind};
pub use session::{SessionStoreFactory, SessionStoreHandle};
pub use validation::signature::SignatureSpec;
pub use validation::{validate, ValidatedConfiguration, Validator};
