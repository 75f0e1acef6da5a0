//! Backup directory layout.
//!
//! A backup is a directory named `<index>-<YYYYMMDD>` holding:
//!
//! | File | Content |
//! |------|---------|
//! | `settings.json` | `{"settings": {...}}` minus cluster-assigned keys |
//! | `mappings.json` | `{"mappings": {<type>: <schema>}}` as returned by the source |
//! | `ingest.json` | `{<pipeline id>: <definition>}`, only when pipelines were found |
//! | `documents.json` | one hit envelope per line, without `_index` and `_score` |

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Index settings file name.
pub const SETTINGS_FILE: &str = "settings.json";
/// Mapping file name.
pub const MAPPINGS_FILE: &str = "mappings.json";
/// Ingest pipeline file name.
pub const INGEST_FILE: &str = "ingest.json";
/// Document stream file name.
pub const DOCUMENTS_FILE: &str = "documents.json";

/// Ingest pipeline id conventionally attached to a document type.
#[must_use]
pub fn pipeline_id(doc_type: &str) -> String {
    format!("{doc_type}-pipeline")
}

/// Document types defined in a `mappings.json` document, sorted by name.
///
/// # Errors
///
/// Returns an error if there is no `mappings` object.
pub fn mapping_types(mappings: &Value) -> Result<Vec<(String, Value)>> {
    let types = mappings
        .get("mappings")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::artifact(MAPPINGS_FILE, "missing \"mappings\" object"))?;
    Ok(types
        .iter()
        .map(|(name, schema)| (name.clone(), schema.clone()))
        .collect())
}

/// A freshly created export directory.
#[derive(Debug, Clone)]
pub struct BackupDir {
    root: PathBuf,
}

impl BackupDir {
    /// Path the export for `index` on `date` goes to.
    #[must_use]
    pub fn path_for(parent: &Path, index: &str, date: NaiveDate) -> PathBuf {
        parent.join(format!("{}-{}", index, date.format("%Y%m%d")))
    }

    /// Creates the directory; fails if anything already sits at that path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackupDirExists`] if the path is taken, or an IO error.
    pub fn create(parent: &Path, index: &str, date: NaiveDate) -> Result<Self> {
        let root = Self::path_for(parent, index, date);
        match std::fs::create_dir(&root) {
            Ok(()) => Ok(Self { root }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::BackupDirExists(root))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `settings.json` path.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// `mappings.json` path.
    #[must_use]
    pub fn mappings_path(&self) -> PathBuf {
        self.root.join(MAPPINGS_FILE)
    }

    /// `ingest.json` path.
    #[must_use]
    pub fn ingest_path(&self) -> PathBuf {
        self.root.join(INGEST_FILE)
    }

    /// `documents.json` path.
    #[must_use]
    pub fn documents_path(&self) -> PathBuf {
        self.root.join(DOCUMENTS_FILE)
    }
}

/// The artifacts of an existing backup, checked for presence.
#[derive(Debug, Clone)]
pub struct BackupArtifacts {
    /// `settings.json`.
    pub settings: PathBuf,
    /// `mappings.json`.
    pub mappings: PathBuf,
    /// `ingest.json`, when the backup has one.
    pub ingest: Option<PathBuf>,
    /// `documents.json`.
    pub documents: PathBuf,
}

impl BackupArtifacts {
    /// Checks that `dir` exists and holds every required artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackupDirMissing`] or [`Error::ArtifactMissing`].
    pub fn locate(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::BackupDirMissing(dir.to_path_buf()));
        }
        let required = |name: &'static str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(Error::ArtifactMissing { name, path })
            }
        };
        let mappings = required(MAPPINGS_FILE)?;
        let settings = required(SETTINGS_FILE)?;
        let documents = required(DOCUMENTS_FILE)?;
        let ingest = Some(dir.join(INGEST_FILE)).filter(|p| p.is_file());

        Ok(Self {
            settings,
            mappings,
            ingest,
            documents,
        })
    }

    /// Reads `settings.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or not a JSON object.
    pub fn load_settings(&self) -> Result<Value> {
        let settings = read_json(&self.settings)?;
        if !settings.is_object() {
            return Err(Error::artifact(SETTINGS_FILE, "expected a JSON object"));
        }
        Ok(settings)
    }

    /// Reads `mappings.json` and splits it per document type.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or has no `mappings` object.
    pub fn load_mappings(&self) -> Result<Vec<(String, Value)>> {
        mapping_types(&read_json(&self.mappings)?)
    }

    /// Reads `ingest.json`; an absent file is an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or not a JSON object.
    pub fn load_pipelines(&self) -> Result<BTreeMap<String, Value>> {
        let Some(path) = &self.ingest else {
            return Ok(BTreeMap::new());
        };
        match read_json(path)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(Error::artifact(INGEST_FILE, "expected a JSON object")),
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
