//! archivefetch - parallel bulk downloads from archive collections
//!
//! This library resolves the file manifest of an archive collection,
//! splits it across a bounded pool of isolated workers and reports a
//! per-file result for every requested file.
//!
//! The main entry points are [`job::DownloadJob`] to describe a run and
//! [`download::DownloadOrchestrator`] to execute it.

pub mod archive;
pub mod config;
pub mod download;
pub mod error;
pub mod job;
pub mod logging;
pub mod manifest;
pub mod partition;

pub use download::{DownloadOrchestrator, RunReport};
pub use error::{FetchError, FetchResult};
pub use job::{DownloadJob, NameFilter};
