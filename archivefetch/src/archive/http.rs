//! archive.org client over blocking HTTP.
//!
//! Implements [`ArchiveCatalog`] through the item metadata API and
//! [`ArchiveTransport`] through the item download endpoint. Files are
//! streamed to a `.part` sibling and renamed into place once complete, so an
//! interrupted transfer never leaves a file that later runs would skip.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use super::metadata::{FileDescriptor, ItemMetadata};
use super::{ArchiveCatalog, ArchiveTransport, CatalogError, FileOutcome};
use crate::error::{FetchError, FetchResult};
use crate::job::{is_valid_identifier, NameFilter};

/// Default archive service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://archive.org";

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Default number of retries per file.
const DEFAULT_RETRIES: u32 = 3;

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Suffix of in-progress download files.
const PARTIAL_SUFFIX: &str = ".part";

/// Settings for [`ArchiveOrgClient`].
#[derive(Debug, Clone)]
pub struct ArchiveOrgSettings {
    /// Service endpoint, e.g. `https://archive.org`.
    pub base_url: String,
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    /// Additional attempts per file after a retryable failure.
    pub retries: u32,
    /// Delay before the first retry; grows linearly with each attempt.
    pub retry_delay: Duration,
}

impl Default for ArchiveOrgSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Failure of a single transfer attempt.
#[derive(Debug)]
enum AttemptError {
    /// Worth retrying: network errors, 5xx, 429, short reads.
    Transient(String),
    /// Not worth retrying: 4xx, local write errors.
    Permanent(String),
}

impl AttemptError {
    fn into_reason(self) -> String {
        match self {
            Self::Transient(reason) | Self::Permanent(reason) => reason,
        }
    }
}

/// Client for the archive.org metadata and download endpoints.
#[derive(Debug)]
pub struct ArchiveOrgClient {
    client: Client,
    base_url: Url,
    settings: ArchiveOrgSettings,
}

impl ArchiveOrgClient {
    /// Create a client with default settings.
    pub fn new() -> FetchResult<Self> {
        Self::with_settings(ArchiveOrgSettings::default())
    }

    /// Create a client with custom settings.
    pub fn with_settings(settings: ArchiveOrgSettings) -> FetchResult<Self> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            FetchError::invalid(format!("invalid base URL '{}': {}", settings.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::invalid(format!(
                "base URL '{}' cannot carry a path",
                settings.base_url
            )));
        }

        let builder = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("archivefetch/", env!("CARGO_PKG_VERSION")));
        // Tests talk to a loopback server.
        #[cfg(test)]
        let builder = builder.no_proxy();
        let client = builder
            .build()
            .map_err(|e| FetchError::invalid(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            settings,
        })
    }

    /// Settings this client was built with.
    pub fn settings(&self) -> &ArchiveOrgSettings {
        &self.settings
    }

    /// URL of the metadata document for `identifier`.
    pub fn metadata_url(&self, identifier: &str) -> Url {
        self.endpoint(["metadata", identifier])
    }

    /// URL of `name` within `identifier`.
    pub fn file_url(&self, identifier: &str, name: &str) -> Url {
        self.endpoint(["download", identifier].into_iter().chain(name.split('/')))
    }

    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.base_url.clone();
        // Checked at construction.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Download one file with retries.
    fn fetch_with_retries(&self, url: &Url, target: &Path) -> Result<u64, String> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url, target) {
                Ok(bytes) => return Ok(bytes),
                Err(AttemptError::Transient(reason)) if attempt < self.settings.retries => {
                    attempt += 1;
                    warn!(
                        url = %url,
                        attempt,
                        retries = self.settings.retries,
                        reason = %reason,
                        "Transfer failed, retrying"
                    );
                    thread::sleep(self.settings.retry_delay * attempt);
                }
                Err(e) => return Err(e.into_reason()),
            }
        }
    }

    /// One transfer attempt: stream into `<target>.part`, then rename.
    fn fetch_once(&self, url: &Url, target: &Path) -> Result<u64, AttemptError> {
        let mut response = self.client.get(url.clone()).send().map_err(|e| {
            AttemptError::Transient(describe_request_error(&e, self.settings.timeout))
        })?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status);
            return Err(if is_retryable(status) {
                AttemptError::Transient(reason)
            } else {
                AttemptError::Permanent(reason)
            });
        }
        let expected = response.content_length();

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AttemptError::Permanent(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let partial = partial_path(target);
        let file = File::create(&partial).map_err(|e| {
            AttemptError::Permanent(format!("failed to write {}: {}", partial.display(), e))
        })?;

        let written = stream_to(&mut response, file, &partial);
        let written = match written {
            Ok(n) => n,
            Err(e) => {
                fs::remove_file(&partial).ok();
                return Err(e);
            }
        };

        if let Some(expected) = expected {
            if written != expected {
                fs::remove_file(&partial).ok();
                return Err(AttemptError::Transient(format!(
                    "truncated transfer: got {} of {} bytes",
                    written, expected
                )));
            }
        }

        fs::rename(&partial, target).map_err(|e| {
            AttemptError::Permanent(format!("failed to write {}: {}", target.display(), e))
        })?;

        Ok(written)
    }
}

impl ArchiveCatalog for ArchiveOrgClient {
    fn list_files(
        &self,
        identifier: &str,
        filter: Option<&NameFilter>,
    ) -> Result<Vec<FileDescriptor>, CatalogError> {
        if !is_valid_identifier(identifier) {
            return Err(CatalogError::Request(format!(
                "invalid collection identifier '{}'",
                identifier
            )));
        }
        let url = self.metadata_url(identifier);
        debug!(url = %url, "Fetching item metadata");

        let response = self.client.get(url).send().map_err(|e| {
            CatalogError::Request(describe_request_error(&e, self.settings.timeout))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(CatalogError::NotFound(identifier.to_string())),
            status if !status.is_success() => {
                return Err(CatalogError::Request(format!("HTTP {}", status)))
            }
            _ => {}
        }

        Ok(ItemMetadata::from_reader(identifier, response)?.into_files(filter))
    }
}

impl ArchiveTransport for ArchiveOrgClient {
    fn download(
        &self,
        identifier: &str,
        destination: &Path,
        names: &[String],
    ) -> Vec<(String, FileOutcome)> {
        if !is_valid_identifier(identifier) {
            warn!(identifier, "Refusing unsafe collection identifier");
            return names
                .iter()
                .map(|name| {
                    let reason = "unsafe collection identifier".to_string();
                    (name.clone(), FileOutcome::Failed(reason))
                })
                .collect();
        }
        let root = destination.join(identifier);

        names
            .iter()
            .map(|name| {
                let outcome = match local_path(&root, name) {
                    None => {
                        warn!(file = %name, "Refusing unsafe file name");
                        FileOutcome::Failed("unsafe file name".to_string())
                    }
                    Some(target) if target.exists() => {
                        debug!(file = %name, "Already present, skipping");
                        FileOutcome::AlreadyPresent
                    }
                    Some(target) => {
                        let url = self.file_url(identifier, name);
                        match self.fetch_with_retries(&url, &target) {
                            Ok(bytes) => {
                                debug!(file = %name, bytes, "Downloaded");
                                FileOutcome::Downloaded(bytes)
                            }
                            Err(reason) => {
                                warn!(file = %name, reason = %reason, "Download failed");
                                FileOutcome::Failed(reason)
                            }
                        }
                    }
                };
                (name.clone(), outcome)
            })
            .collect()
    }
}

/// Map a collection file name to a path under `root`.
///
/// Returns `None` for names that would escape `root`.
fn local_path(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let safe = !name.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| root.join(relative))
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Copy the response body to `file`, returning the bytes written.
fn stream_to(response: &mut impl Read, file: File, path: &Path) -> Result<u64, AttemptError> {
    let mut writer = BufWriter::new(file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| AttemptError::Transient(format!("read error: {}", e)))?;
        if bytes_read == 0 {
            break;
        }

        writer.write_all(&buffer[..bytes_read]).map_err(|e| {
            AttemptError::Permanent(format!("failed to write {}: {}", path.display(), e))
        })?;
        written += bytes_read as u64;
    }

    writer.flush().map_err(|e| {
        AttemptError::Permanent(format!("failed to write {}: {}", path.display(), e))
    })?;

    Ok(written)
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn describe_request_error(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs())
    } else {
        e.to_string()
    }
}
