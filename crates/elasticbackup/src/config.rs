//! Configuration types for the backup and restore tools.
//!
//! Options can come from a YAML file (`--config`) and are then overridden by
//! explicit command-line flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Index settings assigned by the cluster at creation time.
///
/// Newer clusters add more of these (`provided_name`, `routing`, ...); extra
/// keys go in [`BackupOptions::strip_settings`].
pub const CLUSTER_ASSIGNED_SETTINGS: [&str; 5] = [
    "uuid",
    "version",
    "creation_date",
    "number_of_shards",
    "number_of_replicas",
];

/// Export options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOptions {
    /// Parent directory under which `<index>-<date>` is created.
    #[serde(default = "default_backup_parent")]
    pub backup_dir: PathBuf,
    /// Documents per scroll page.
    #[serde(default = "default_batch_size")]
    pub page_size: usize,
    /// Search body; `None` means match-all.
    #[serde(default)]
    pub query: Option<serde_json::Value>,
    /// Pause between scroll pages, in seconds.
    #[serde(default = "default_sleep_time")]
    pub sleep_time: f64,
    /// Scroll cursor lifetime, in seconds.
    #[serde(default = "default_scroll_time")]
    pub scroll_time: u64,
    /// Per-request HTTP timeout, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Settings keys removed in addition to [`CLUSTER_ASSIGNED_SETTINGS`].
    #[serde(default)]
    pub strip_settings: Vec<String>,
    /// Draw a progress bar on stderr.
    #[serde(default)]
    pub progress: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_parent(),
            page_size: default_batch_size(),
            query: None,
            sleep_time: default_sleep_time(),
            scroll_time: default_scroll_time(),
            request_timeout: default_request_timeout(),
            strip_settings: Vec::new(),
            progress: false,
        }
    }
}

impl BackupOptions {
    /// Load options from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: Self = serde_yaml::from_str(&content)?;
        Ok(options)
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns an error if a size is zero or the delay is negative.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page size must be greater than 0".to_string()));
        }
        if self.scroll_time == 0 {
            return Err(Error::Config(
                "scroll time must be greater than 0".to_string(),
            ));
        }
        validate_delay("sleep time", self.sleep_time)?;
        validate_request_timeout(self.request_timeout)?;
        if let Some(query) = &self.query {
            if !query.is_object() {
                return Err(Error::Config("query must be a JSON object".to_string()));
            }
        }
        Ok(())
    }

    /// Every settings key removed before `settings.json` is written.
    #[must_use]
    pub fn stripped_settings(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = CLUSTER_ASSIGNED_SETTINGS.to_vec();
        for extra in &self.strip_settings {
            if !keys.contains(&extra.as_str()) {
                keys.push(extra);
            }
        }
        keys
    }

    /// Scroll lifetime in the store's time-unit syntax (`"600s"`).
    #[must_use]
    pub fn scroll_keepalive(&self) -> String {
        format!("{}s", self.scroll_time)
    }

    /// Pause between scroll pages.
    #[must_use]
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs_f64(self.sleep_time.max(0.0))
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Import options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Backup directory produced by the export tool.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    /// Maximum records per bulk request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause after each index-shell step, in seconds.
    #[serde(default = "default_settle_time")]
    pub settle_time: f64,
    /// How long to wait for the reopened index to turn yellow, in seconds.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: u64,
    /// Per-request HTTP timeout, in seconds. The readiness poll is bounded by
    /// `ready_timeout` instead.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Draw a progress bar on stderr.
    #[serde(default)]
    pub progress: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            backup_dir: None,
            batch_size: default_batch_size(),
            settle_time: default_settle_time(),
            ready_timeout: default_ready_timeout(),
            request_timeout: default_request_timeout(),
            progress: false,
        }
    }
}

impl RestoreOptions {
    /// Load options from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: Self = serde_yaml::from_str(&content)?;
        Ok(options)
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory is unset, the batch size is
    /// zero or the settle time is negative.
    pub fn validate(&self) -> Result<()> {
        if self.backup_dir.is_none() {
            return Err(Error::Config("backup directory is required".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config(
                "batch size must be greater than 0".to_string(),
            ));
        }
        validate_delay("settle time", self.settle_time)?;
        validate_request_timeout(self.request_timeout)?;
        Ok(())
    }

    /// Pause after each index-shell step.
    #[must_use]
    pub fn settle_duration(&self) -> Duration {
        Duration::from_secs_f64(self.settle_time.max(0.0))
    }

    /// Upper bound for the readiness poll.
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// HTTP basic-auth credential pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password (may be empty).
    pub password: String,
}

impl Credentials {
    /// Parses `user:pass`. The password may itself contain colons.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no colon or the user part is empty.
    pub fn parse(value: &str) -> Result<Self> {
        let (username, password) = value
            .split_once(':')
            .ok_or_else(|| Error::Config("credentials must be in format user:pass".to_string()))?;
        if username.is_empty() {
            return Err(Error::Config("credentials user cannot be empty".to_string()));
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl std::str::FromStr for Credentials {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn validate_delay(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::Config(format!(
            "{name} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

fn validate_request_timeout(secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(Error::Config(
            "request timeout must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn default_backup_parent() -> PathBuf {
    PathBuf::from("./")
}

fn default_batch_size() -> usize {
    1000
}

fn default_sleep_time() -> f64 {
    1.0
}

fn default_scroll_time() -> u64 {
    600
}

fn default_settle_time() -> f64 {
    1.0
}

fn default_ready_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    120
}
