//! Configuration file support.
//!
//! Settings live in an INI file at `<config dir>/archivefetch/config.ini`:
//!
//! ```ini
//! [download]
//! workers = 4
//! timeout = 300
//! retries = 3
//! worker_timeout = 0
//! destination = /data/archive
//!
//! [archive]
//! base_url = https://archive.org
//! ```
//!
//! Missing files and keys fall back to defaults. Command-line flags override
//! file values when specified.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use reqwest::Url;
use thiserror::Error;

use crate::archive::{ArchiveOrgSettings, DEFAULT_BASE_URL};
use crate::job::DEFAULT_WORKERS;

/// Name of the configuration file.
const CONFIG_FILE_NAME: &str = "config.ini";

/// Directory name under the platform config directory.
const APP_DIR_NAME: &str = "archivefetch";

/// Errors loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid INI.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// No such configuration key.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Number of concurrent workers.
    pub workers: usize,
    /// HTTP request timeout in seconds.
    pub timeout: u64,
    /// Retries per file after a transient failure.
    pub retries: u32,
    /// Seconds to wait for any one worker; 0 waits indefinitely.
    pub worker_timeout: u64,
    /// Default destination directory.
    pub destination: Option<PathBuf>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: 300,
            retries: 3,
            worker_timeout: 0,
            destination: None,
        }
    }
}

/// `[archive]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    /// Archive service endpoint.
    pub base_url: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub archive: ArchiveSettings,
}

/// Directory holding the configuration file.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

impl ConfigFile {
    /// Load the configuration file from its default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load a configuration file, returning defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ini = Ini::load_from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }

        Ok(config)
    }

    /// Save the configuration file to its default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save the configuration file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path).map_err(io_error)
    }

    /// Client settings derived from this configuration.
    pub fn client_settings(&self) -> ArchiveOrgSettings {
        ArchiveOrgSettings {
            base_url: self.archive.base_url.clone(),
            timeout: Duration::from_secs(self.download.timeout),
            retries: self.download.retries,
            ..Default::default()
        }
    }

    /// Worker timeout, or `None` when unbounded.
    pub fn worker_timeout(&self) -> Option<Duration> {
        let secs = self.download.worker_timeout;
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

/// A settable configuration key, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DownloadWorkers,
    DownloadTimeout,
    DownloadRetries,
    DownloadWorkerTimeout,
    DownloadDestination,
    ArchiveBaseUrl,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::DownloadWorkers,
            Self::DownloadTimeout,
            Self::DownloadRetries,
            Self::DownloadWorkerTimeout,
            Self::DownloadDestination,
            Self::ArchiveBaseUrl,
        ]
    }

    /// INI section holding this key.
    pub fn section(&self) -> &'static str {
        match self {
            Self::ArchiveBaseUrl => "archive",
            _ => "download",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            Self::DownloadWorkers => "workers",
            Self::DownloadTimeout => "timeout",
            Self::DownloadRetries => "retries",
            Self::DownloadWorkerTimeout => "worker_timeout",
            Self::DownloadDestination => "destination",
            Self::ArchiveBaseUrl => "base_url",
        }
    }

    /// Fully qualified name, e.g. `download.workers`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::DownloadWorkers => config.download.workers.to_string(),
            Self::DownloadTimeout => config.download.timeout.to_string(),
            Self::DownloadRetries => config.download.retries.to_string(),
            Self::DownloadWorkerTimeout => config.download.worker_timeout.to_string(),
            Self::DownloadDestination => config
                .download
                .destination
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            Self::ArchiveBaseUrl => config.archive.base_url.clone(),
        }
    }

    /// Parse and store `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            Self::DownloadWorkers => {
                config.download.workers = self.parse_positive(value)?;
            }
            Self::DownloadTimeout => {
                config.download.timeout = self.parse_positive(value)?;
            }
            Self::DownloadRetries => {
                config.download.retries = self.parse(value)?;
            }
            Self::DownloadWorkerTimeout => {
                config.download.worker_timeout = self.parse(value)?;
            }
            Self::DownloadDestination => {
                config.download.destination =
                    (!value.is_empty()).then(|| PathBuf::from(value));
            }
            Self::ArchiveBaseUrl => {
                Url::parse(value).map_err(|e| self.invalid(value, e))?;
                config.archive.base_url = value.to_string();
            }
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value.parse().map_err(|e| self.invalid(value, e))
    }

    fn parse_positive<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr + Default + PartialEq,
        T::Err: fmt::Display,
    {
        let parsed: T = self.parse(value)?;
        if parsed == T::default() {
            return Err(self.invalid(value, "must be greater than zero"));
        }
        Ok(parsed)
    }

    fn invalid(&self, value: &str, reason: impl fmt::Display) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}
