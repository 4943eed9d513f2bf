//! Logging settings and tracing setup.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

use crate::error::{ConfigError, ErrorKind, ValidationErrors};
use crate::options::Options;

/// Validated logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
    /// Local time instead of UTC in request and auth log timestamps.
    pub local_time: bool,
    /// Standard logging enabled.
    pub standard: bool,
    /// Request logging enabled.
    pub request: bool,
    /// Auth logging enabled.
    pub auth: bool,
    /// Paths excluded from request logging.
    pub exclude_paths: Vec<String>,
}

impl LoggingSettings {
    /// Whether every log stream is off.
    pub fn is_disabled(&self) -> bool {
        !self.standard && !self.request && !self.auth
    }
}

/// Validate the logging options.
///
/// Only a permission failure on the log file is an error; a missing
/// directory is left to the writer.
pub fn validate_logging(opts: &Options, errors: &mut ValidationErrors) -> LoggingSettings {
    let logging = &opts.logging;

    let file = if logging.filename.is_empty() {
        None
    } else {
        let open = OpenOptions::new().create(true).append(true).open(&logging.filename);
        if let Err(err) = open {
            if err.kind() == io::ErrorKind::PermissionDenied {
                errors.push(ConfigError::new(
                    "logging-filename",
                    ErrorKind::Unreadable,
                    format!("unable to write to log file: {}", logging.filename),
                ));
            }
        }
        Some(PathBuf::from(&logging.filename))
    };

    let mut exclude_paths: Vec<String> = logging
        .exclude_logging_paths
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(String::from)
        .collect();
    if logging.silence_ping_logging {
        exclude_paths.push(opts.ping_path.clone());
    }

    let settings = LoggingSettings {
        file,
        local_time: logging.local_time,
        standard: logging.standard_logging,
        request: logging.request_logging,
        auth: logging.auth_logging,
        exclude_paths,
    };
    if settings.is_disabled() {
        tracing::warn!("Logging disabled. No further logs will be shown.");
    }
    settings
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Output goes to the log file
/// when one is configured, stderr otherwise.
#[cfg(feature = "logging")]
pub fn init_tracing(settings: &LoggingSettings) -> crate::error::Result<()> {
    use crate::error::Error;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let default_filter = if settings.standard { "info" } else { "off" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let file_layer = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        },
        None => None,
    };
    let stderr_layer = settings
        .file
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| Error::Config(format!("failed to initialise tracing: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclude_paths() {
        let mut opts = Options::default();
        opts.logging.exclude_logging_paths = "/metrics, /healthz,".to_string();
        opts.logging.silence_ping_logging = true;

        let settings = validate_logging(&opts, &mut ValidationErrors::new());

        assert_eq!(settings.exclude_paths, vec!["/metrics", "/healthz", "/ping"]);
        assert!(settings.file.is_none());
    }

    #[test]
    fn test_no_exclusions_by_default() {
        let settings = validate_logging(&Options::default(), &mut ValidationErrors::new());
        assert!(settings.exclude_paths.is_empty());
        assert!(!settings.is_disabled());
    }

    #[test]
    fn test_writable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.log");
        let mut opts = Options::default();
        opts.logging.filename = path.display().to_string();
        let mut errors = ValidationErrors::new();

        let settings = validate_logging(&opts, &mut errors);

        assert!(errors.is_empty());
        assert_eq!(settings.file.as_deref(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_all_streams_off() {
        let mut opts = Options::default();
        opts.logging.standard_logging = false;
        opts.logging.request_logging = false;
        opts.logging.auth_logging = false;

        let settings = validate_logging(&opts, &mut ValidationErrors::new());
        assert!(settings.is_disabled());
    }
}
