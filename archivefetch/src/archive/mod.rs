//! Collaborators backed by a remote archive service.
//!
//! The download core talks to the archive through two traits:
//!
//! - [`ArchiveCatalog`] lists the files of a collection
//! - [`ArchiveTransport`] fetches a batch of named files into a directory
//!
//! [`ArchiveOrgClient`] implements both against the archive.org HTTP API.
//! Tests substitute in-memory implementations.

mod http;
mod metadata;

use std::path::Path;

use thiserror::Error;

use crate::job::NameFilter;

pub use http::{ArchiveOrgClient, ArchiveOrgSettings, DEFAULT_BASE_URL};
pub use metadata::{FileDescriptor, ItemMetadata};

/// Errors returned by an [`ArchiveCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The identifier does not name an existing collection.
    #[error("collection '{0}' does not exist")]
    NotFound(String),

    /// The catalog request could not be completed.
    #[error("catalog request failed: {0}")]
    Request(String),

    /// The catalog response could not be decoded.
    #[error("malformed catalog response: {0}")]
    Malformed(String),
}

/// A single file that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {reason}")]
pub struct TransferFailure {
    /// File name within the collection.
    pub name: String,
    /// Human-readable failure reason.
    pub reason: String,
}

impl TransferFailure {
    /// Create a new transfer failure.
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Per-file result reported by an [`ArchiveTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was fetched; carries the number of bytes written.
    Downloaded(u64),
    /// The file already existed at the destination and was skipped.
    AlreadyPresent,
    /// The file could not be fetched.
    Failed(String),
}

impl FileOutcome {
    /// Returns true if the file is available locally after the call.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Downloaded(_) | Self::AlreadyPresent)
    }
}

/// Lists the files of a collection.
pub trait ArchiveCatalog: Send + Sync {
    /// List the files of `identifier`, keeping only names matching `filter`.
    fn list_files(
        &self,
        identifier: &str,
        filter: Option<&NameFilter>,
    ) -> Result<Vec<FileDescriptor>, CatalogError>;
}

/// Fetches named files of a collection into a local directory.
///
/// Implementations are invoked concurrently from several workers, each with a
/// disjoint set of names. Files already present at the destination must be
/// skipped rather than fetched again.
pub trait ArchiveTransport: Send + Sync {
    /// Fetch `names` from `identifier` into `destination`.
    ///
    /// Returns one outcome per requested name.
    fn download(
        &self,
        identifier: &str,
        destination: &Path,
        names: &[String],
    ) -> Vec<(String, FileOutcome)>;
}
