//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use archivefetch::archive::{ArchiveOrgClient, ArchiveOrgSettings};
use archivefetch::config::ConfigFile;
use clap::Args;

use crate::error::CliError;

/// Archive connection flags shared by commands that talk to the service.
#[derive(Debug, Clone, Default, Args)]
pub struct ClientArgs {
    /// Archive service endpoint [default: from config, else https://archive.org]
    #[arg(long)]
    pub base_url: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries per file after a transient failure
    #[arg(long)]
    pub retries: Option<u32>,
}

impl ClientArgs {
    /// Resolve client settings from CLI args and config.
    pub fn resolve(&self, config: &ConfigFile) -> ArchiveOrgSettings {
        // CLI takes precedence, then config
        let mut settings = config.client_settings();
        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.timeout = Duration::from_secs(timeout);
        }
        if let Some(retries) = self.retries {
            settings.retries = retries;
        }
        settings
    }
}

/// Load the configuration file.
pub fn load_config() -> Result<ConfigFile, CliError> {
    Ok(ConfigFile::load()?)
}

/// Build an archive client from resolved settings.
pub fn build_client(settings: ArchiveOrgSettings) -> Result<Arc<ArchiveOrgClient>, CliError> {
    if settings.timeout.is_zero() {
        return Err(CliError::Config(
            "timeout must be at least 1 second".to_string(),
        ));
    }
    Ok(Arc::new(ArchiveOrgClient::with_settings(settings)?))
}

/// Resolve the destination directory from CLI args and config.
pub fn resolve_destination(
    cli_destination: Option<PathBuf>,
    config: &ConfigFile,
) -> Result<PathBuf, CliError> {
    cli_destination
        .or_else(|| config.download.destination.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No destination given. Use --dest or set download.destination \
                 with 'archivefetch config set'."
                    .to_string(),
            )
        })
}

/// Resolve the worker count from CLI args and config.
pub fn resolve_workers(cli_workers: Option<usize>, config: &ConfigFile) -> usize {
    cli_workers.unwrap_or(config.download.workers)
}

/// Resolve the per-worker timeout from CLI args and config. Zero is unbounded.
pub fn resolve_worker_timeout(cli_secs: Option<u64>, config: &ConfigFile) -> Option<Duration> {
    match cli_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.worker_timeout(),
    }
}
