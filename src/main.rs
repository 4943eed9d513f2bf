//! authgate-check: validate a gateway configuration file.
//!
//! Exits non-zero and prints every defect when the configuration is invalid.

use anyhow::{Context, Result};
use authgate::logging::{init_tracing, validate_logging};
use authgate::{Error, Options, ValidationErrors, Validator};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Validate an authentication gateway configuration
#[derive(Parser)]
#[command(name = "authgate-check")]
#[command(about = "Validate an authentication gateway configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Override the discovery timeout in seconds
    #[arg(long)]
    discovery_timeout: Option<u64>,

    /// Print the resolved configuration on success
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut opts = Options::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(secs) = cli.discovery_timeout {
        opts.discovery_timeout_secs = secs;
    }

    init_tracing(&validate_logging(&opts, &mut ValidationErrors::new()))?;

    let validator = Validator::from_options(&opts)?;
    match validator.validate(&opts).await {
        Ok(config) => {
            println!(
                "configuration ok: provider {} ({} upstreams, {} bearer verifiers, {} sessions)",
                config.provider.data.display_name,
                config.upstreams.len(),
                config.jwt_bearer_verifiers.len(),
                config.session_store.kind()
            );
            if cli.verbose {
                println!("{:#?}", config);
            }
            Ok(ExitCode::SUCCESS)
        },
        Err(err @ Error::Invalid(_)) | Err(err @ Error::Discovery(_)) => {
            eprintln!("{}", err);
            Ok(ExitCode::FAILURE)
        },
        Err(err) => Err(err.into()),
    }
}
