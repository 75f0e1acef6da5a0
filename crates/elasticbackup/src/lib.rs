// CLI-oriented library - pedantic lints relaxed for ergonomics
#![allow(clippy::pedantic)]

//! # elasticbackup
//!
//! Point-in-time backup and restore of an Elasticsearch index: settings,
//! mappings, ingest pipelines and documents.
//!
//! ## Tools
//!
//! | Binary | Does |
//! |--------|------|
//! | `elasticbackup` | Scrolls an index into a fresh `<index>-<YYYYMMDD>` directory |
//! | `elasticrestore` | Replays such a directory into a new index with bulk writes |
//!
//! ## Quick Start
//!
//! ```bash
//! # Export
//! elasticbackup localhost:9200 logs -d /var/backups -b 500 -v
//!
//! # Import into a new index on another cluster
//! elasticrestore es2:9200 logs -d /var/backups/logs-20240131 -b 1000 -v
//! ```
//!
//! ## Library use
//!
//! Both pipelines are generic over [`IndexStore`]; [`HttpStore`] talks to a
//! real cluster.
//!
//! ```no_run
//! # async fn demo() -> elasticbackup::Result<()> {
//! use elasticbackup::{run_backup, BackupOptions, HttpStore};
//!
//! let store = HttpStore::new("localhost:9200", None);
//! let options = BackupOptions::default();
//! let today = chrono::Utc::now().date_naive();
//! let report = run_backup(&store, "logs", &options, today).await?;
//! println!("{} documents in {}", report.documents.documents, report.dir.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod artifacts;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod restore;
pub mod store;

pub use artifacts::{BackupArtifacts, BackupDir};
pub use backup::{run_backup, BackupReport, ExportStats, ScrollReader};
pub use config::{BackupOptions, Credentials, RestoreOptions};
pub use error::{Error, Result};
pub use logging::Verbosity;
pub use restore::{run_restore, Batch, DocumentBatches, ImportStats, RestoreReport};
pub use store::{HttpStore, IndexStore};
