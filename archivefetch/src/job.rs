//! Download job configuration.
//!
//! A [`DownloadJob`] is the immutable description of one run: which
//! collection to fetch, where to put it, which files to keep and how many
//! workers to use. It is validated once, when built.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use glob::Pattern;

use crate::error::{FetchError, FetchResult};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Name of the scratch file used to check that a destination is writable.
const WRITE_CHECK_FILE: &str = ".archivefetch-write-check";

/// Returns true if `identifier` is usable as one directory level under the
/// destination: no separators, not `.` or `..`.
pub fn is_valid_identifier(identifier: &str) -> bool {
    if identifier.contains(|c: char| c == '/' || c == '\\') {
        return false;
    }
    let mut components = Path::new(identifier).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Glob-style file name filter.
///
/// Several alternatives may be given separated by `|`, e.g. `*.txt|*.pdf`.
/// A name matches if any alternative matches.
#[derive(Clone)]
pub struct NameFilter {
    source: String,
    patterns: Vec<Pattern>,
}

impl NameFilter {
    /// Compile a filter expression.
    pub fn new(expr: &str) -> FetchResult<Self> {
        let patterns = expr
            .split('|')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    FetchError::invalid(format!("invalid name filter '{}': {}", p, e))
                })
            })
            .collect::<FetchResult<Vec<_>>>()?;

        if patterns.is_empty() {
            return Err(FetchError::invalid("name filter is empty"));
        }

        Ok(Self {
            source: expr.to_string(),
            patterns,
        })
    }

    /// Returns true if `name` matches any alternative.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }

    /// The expression this filter was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NameFilter").field(&self.source).finish()
    }
}

impl fmt::Display for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Immutable description of one download run.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    identifier: String,
    destination: PathBuf,
    filter: Option<NameFilter>,
    workers: usize,
    worker_timeout: Option<Duration>,
}

impl DownloadJob {
    /// Start building a job for `identifier` into `destination`.
    pub fn builder(
        identifier: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> DownloadJobBuilder {
        DownloadJobBuilder {
            identifier: identifier.into(),
            destination: destination.into(),
            filter: None,
            workers: DEFAULT_WORKERS,
            worker_timeout: None,
        }
    }

    /// Collection identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Local destination directory.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Optional file name filter.
    pub fn filter(&self) -> Option<&NameFilter> {
        self.filter.as_ref()
    }

    /// Maximum number of concurrent workers (at least 1).
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Upper bound on how long the executor waits for any one worker.
    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout
    }

    /// Create the destination directory and check that it accepts writes.
    pub fn prepare_destination(&self) -> FetchResult<()> {
        let not_writable = |source| FetchError::DestinationNotWritable {
            path: self.destination.clone(),
            source,
        };

        fs::create_dir_all(&self.destination).map_err(not_writable)?;

        let scratch = self.destination.join(WRITE_CHECK_FILE);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&scratch)
            .map_err(not_writable)?;
        fs::remove_file(&scratch).map_err(not_writable)?;

        Ok(())
    }
}

/// Builder for [`DownloadJob`].
#[derive(Debug, Clone)]
pub struct DownloadJobBuilder {
    identifier: String,
    destination: PathBuf,
    filter: Option<String>,
    workers: usize,
    worker_timeout: Option<Duration>,
}

impl DownloadJobBuilder {
    /// Keep only files matching the glob expression `filter`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the number of concurrent workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Bound the time the executor waits for any one worker.
    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = Some(timeout);
        self
    }

    /// Validate and build the job.
    pub fn build(self) -> FetchResult<DownloadJob> {
        let identifier = self.identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(FetchError::invalid("collection identifier is required"));
        }
        if !is_valid_identifier(&identifier) {
            return Err(FetchError::invalid(format!(
                "collection identifier '{}' must be a single path component",
                identifier
            )));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(FetchError::invalid("destination directory is required"));
        }
        if self.workers == 0 {
            return Err(FetchError::invalid("worker count must be at least 1"));
        }
        if self.worker_timeout == Some(Duration::ZERO) {
            return Err(FetchError::invalid("worker timeout must be positive"));
        }

        let filter = self.filter.as_deref().map(NameFilter::new).transpose()?;

        Ok(DownloadJob {
            identifier,
            destination: self.destination,
            filter,
            workers: self.workers,
            worker_timeout: self.worker_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let job = DownloadJob::builder("demo-collection", "/tmp/out").build().unwrap();

        assert_eq!(job.identifier(), "demo-collection");
        assert_eq!(job.destination(), Path::new("/tmp/out"));
        assert!(job.filter().is_none());
        assert_eq!(job.workers(), DEFAULT_WORKERS);
        assert_eq!(job.worker_timeout(), None);
    }

    #[test]
    fn test_builder_pattern() {
        let job = DownloadJob::builder("demo-collection", "/tmp/out")
            .with_filter("*.txt")
            .with_workers(8)
            .with_worker_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(job.filter().map(|f| f.as_str()), Some("*.txt"));
        assert_eq!(job.workers(), 8);
        assert_eq!(job.worker_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_rejects_empty_identifier() {
        let err = DownloadJob::builder("  ", "/tmp/out").build().unwrap_err();
        assert!(err.to_string().contains("identifier is required"));
    }

    #[test]
    fn test_rejects_identifier_with_slash() {
        let err = DownloadJob::builder("a/b", "/tmp/out").build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rejects_dot_identifiers() {
        for identifier in ["..", ".", "a\\b", "..\\escape"] {
            let err = DownloadJob::builder(identifier, "/tmp/out").build().unwrap_err();
            assert!(err.is_configuration(), "accepted {:?}", identifier);
        }
        assert!(DownloadJob::builder("my.collection..v2", "/tmp/out").build().is_ok());
    }

    #[test]
    fn test_rejects_empty_destination() {
        let err = DownloadJob::builder("demo", "").build().unwrap_err();
        assert!(err.to_string().contains("destination directory is required"));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = DownloadJob::builder("demo", "/tmp/out")
            .with_workers(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_rejects_zero_worker_timeout() {
        let err = DownloadJob::builder("demo", "/tmp/out")
            .with_worker_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rejects_malformed_filter() {
        let err = DownloadJob::builder("demo", "/tmp/out")
            .with_filter("[abc")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("invalid name filter"));
    }

    #[test]
    fn test_name_filter_alternatives() {
        let filter = NameFilter::new("*.txt | *.pdf").unwrap();

        assert!(filter.matches("a.txt"));
        assert!(filter.matches("docs/b.pdf"));
        assert!(!filter.matches("c.mp3"));
    }

    #[test]
    fn test_name_filter_empty() {
        assert!(NameFilter::new(" | ").is_err());
    }

    #[test]
    fn test_prepare_destination_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("nested").join("out");
        let job = DownloadJob::builder("demo", &dest).build().unwrap();

        job.prepare_destination().unwrap();

        assert!(dest.is_dir());
        assert!(!dest.join(WRITE_CHECK_FILE).exists());
    }

    #[test]
    fn test_prepare_destination_rejects_file() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("occupied");
        fs::write(&dest, b"not a directory").unwrap();
        let job = DownloadJob::builder("demo", &dest).build().unwrap();

        let err = job.prepare_destination().unwrap_err();
        assert!(matches!(err, FetchError::DestinationNotWritable { .. }));
    }
}
