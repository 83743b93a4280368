//! CLI error type.

use archivefetch::config::ConfigError;
use archivefetch::logging::LoggingError;
use archivefetch::FetchError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid command-line arguments or settings.
    #[error("{0}")]
    Config(String),

    /// The configuration file could not be loaded or saved.
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    /// Logging could not be set up.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// The run could not start or was aborted.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The Ctrl-C handler could not be installed.
    #[error("failed to set signal handler: {0}")]
    Signal(String),

    /// The run finished but some files were not fetched.
    #[error("{failed} of {requested} files failed")]
    IncompleteRun { failed: usize, requested: usize },
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// `2` marks bad input rejected before any network activity, `1` any
    /// other failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::ConfigFile(_) => 2,
            Self::Fetch(e) if e.is_configuration() => 2,
            _ => 1,
        }
    }
}
