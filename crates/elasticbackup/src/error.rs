//! Error types for elasticbackup.
//!
//! A single error enum covers the store transport, the backup artifacts and the
//! preconditions both tools check before touching anything.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for elasticbackup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while backing up or restoring an index.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid option or argument.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced a response (DNS, refused connection, timeout).
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("Elasticsearch error {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body as returned by the store.
        body: String,
    },

    /// Credentials were rejected (401/403).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The store answered with a body of an unexpected shape.
    #[error("Unexpected response: {0}")]
    Response(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A backup artifact has the wrong shape.
    #[error("Malformed artifact {name}: {reason}")]
    Artifact {
        /// Artifact file name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A line of the document stream could not be turned into a bulk record.
    #[error("Malformed document on line {line}: {reason}")]
    MalformedDocument {
        /// 1-based line number in the document stream.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Export target directory is already there.
    #[error("Dir {0} already exists. Resolve it, please")]
    BackupDirExists(PathBuf),

    /// Import source directory is not there.
    #[error("Backup path {0} does not exist")]
    BackupDirMissing(PathBuf),

    /// A required artifact is missing from the backup directory.
    #[error("{name} path {path} does not exist")]
    ArtifactMissing {
        /// Artifact file name.
        name: &'static str,
        /// Full path that was checked.
        path: PathBuf,
    },

    /// The destination index is already there.
    #[error("Index {0} already exists")]
    IndexExists(String),

    /// A bulk write reported at least one rejected record.
    #[error("Bulk write of batch {batch} reported errors: {response}")]
    BulkRejected {
        /// 1-based batch number.
        batch: u64,
        /// Full response body.
        response: String,
    },
}

impl Error {
    /// Returns true for the checks that run before any mutating call.
    ///
    /// The binaries report these as a warning and exit cleanly.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::BackupDirExists(_)
                | Self::BackupDirMissing(_)
                | Self::ArtifactMissing { .. }
                | Self::IndexExists(_)
        )
    }

    pub(crate) fn artifact(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Artifact {
            name,
            reason: reason.into(),
        }
    }
}
