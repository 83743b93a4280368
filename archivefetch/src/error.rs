//! Error types for download runs.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::CatalogError;

/// Result type for run-level operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that abort a download run before or instead of producing a report.
///
/// Per-file and per-worker failures never appear here; they are recorded in
/// the [`RunReport`](crate::download::RunReport).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The job configuration was rejected before any network activity.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The destination directory could not be created or is not writable.
    #[error("destination {} is not writable: {source}", path.display())]
    DestinationNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collection manifest could not be obtained.
    #[error("manifest unavailable for '{identifier}': {source}")]
    ManifestUnavailable {
        identifier: String,
        #[source]
        source: CatalogError,
    },

    /// The run was cancelled before any worker was dispatched.
    #[error("run cancelled before dispatch")]
    Cancelled,
}

impl FetchError {
    /// Shorthand for an [`FetchError::InvalidConfiguration`] error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Returns true if this error was raised before any network activity.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::DestinationNotWritable { .. }
        )
    }
}
