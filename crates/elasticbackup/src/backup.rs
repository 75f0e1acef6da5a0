//! Export side: settings, mappings, ingest pipelines and the scrolled document stream.

use chrono::NaiveDate;
use indicatif::ProgressBar;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::artifacts::{mapping_types, pipeline_id, BackupDir};
use crate::config::BackupOptions;
use crate::error::{Error, Result};
use crate::progress::create_progress_bar;
use crate::store::{Hit, IndexStore, SearchPage};

/// Metadata fields that only make sense on the source cluster.
pub const TRANSIENT_FIELDS: [&str; 2] = ["_index", "_score"];

/// Document export statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportStats {
    /// Non-empty pages received.
    pub pages: u64,
    /// Documents written.
    pub documents: u64,
    /// Total matches the store reported on the first page.
    pub reported_total: Option<u64>,
}

/// Outcome of a full export.
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// Directory holding the artifacts.
    pub dir: PathBuf,
    /// Pipelines written to `ingest.json`.
    pub pipelines: usize,
    /// Document stream statistics.
    pub documents: ExportStats,
}

/// Removes `keys` from an index settings object. Absent keys are skipped.
pub fn strip_settings(settings: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if settings.remove(*key).is_none() {
            debug!("setting {} not present, nothing to strip", key);
        }
    }
}

/// Writes `{"settings": {...}}` for `index` and returns it.
///
/// # Errors
///
/// Returns an error if the request fails, the response has no
/// `<index>.settings.index` object, or writing fails.
pub async fn export_settings<S, W>(
    store: &S,
    index: &str,
    strip: &[&str],
    mut writer: W,
) -> Result<Value>
where
    S: IndexStore + ?Sized,
    W: Write,
{
    info!("Write settings");
    let response = store.get_settings(index).await?;
    let mut settings = response
        .get(index)
        .and_then(|v| v.get("settings"))
        .and_then(|v| v.get("index"))
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| {
            Error::Response(format!("settings response has no {index}.settings.index"))
        })?;

    strip_settings(&mut settings, strip);

    let document = serde_json::json!({ "settings": settings });
    serde_json::to_writer(&mut writer, &document)?;
    writer.flush()?;
    info!("Write settings complete");
    Ok(document)
}

/// Writes the mapping document for `index` verbatim and returns it.
///
/// # Errors
///
/// Returns an error if the request fails, the response has no `<index>` entry,
/// or writing fails.
pub async fn export_mappings<S, W>(store: &S, index: &str, mut writer: W) -> Result<Value>
where
    S: IndexStore + ?Sized,
    W: Write,
{
    info!("Write mappings");
    let response = store.get_mapping(index).await?;
    let mapping = response
        .get(index)
        .cloned()
        .ok_or_else(|| Error::Response(format!("mapping response has no entry for {index}")))?;
    serde_json::to_writer(&mut writer, &mapping)?;
    writer.flush()?;
    info!("Write mappings complete");
    Ok(mapping)
}

/// Collects the `<type>-pipeline` definitions that exist for the mapped types.
///
/// # Errors
///
/// Returns an error if the mapping has no types object or a lookup fails for
/// a reason other than absence.
pub async fn export_pipelines<S>(store: &S, mappings: &Value) -> Result<BTreeMap<String, Value>>
where
    S: IndexStore + ?Sized,
{
    let mut pipelines = BTreeMap::new();
    for (doc_type, _) in mapping_types(mappings)? {
        let id = pipeline_id(&doc_type);
        match store.get_pipeline(&id).await? {
            Some(definition) => {
                info!("Found ingest pipeline {}", id);
                pipelines.insert(id, definition);
            }
            None => debug!("No ingest pipeline {}", id),
        }
    }
    Ok(pipelines)
}

enum ScrollState {
    Initiating,
    Scrolling { scroll_id: String },
    Finished,
}

/// Pages through every document of an index with a server-side cursor.
///
/// Holds at most one live cursor and never requests the next page before the
/// current one has been handed out.
pub struct ScrollReader<'a, S: IndexStore + ?Sized> {
    store: &'a S,
    index: &'a str,
    query: Value,
    page_size: usize,
    keepalive: String,
    delay: Duration,
    state: ScrollState,
    reported_total: Option<u64>,
}

impl<'a, S: IndexStore + ?Sized> ScrollReader<'a, S> {
    /// Creates a reader; `query` defaults to match-all.
    pub fn new(
        store: &'a S,
        index: &'a str,
        query: Option<Value>,
        page_size: usize,
        keepalive: String,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            index,
            query: query.unwrap_or_else(|| serde_json::json!({ "query": { "match_all": {} } })),
            page_size,
            keepalive,
            delay,
            state: ScrollState::Initiating,
            reported_total: None,
        }
    }

    /// Creates a reader from export options.
    pub fn from_options(store: &'a S, index: &'a str, options: &BackupOptions) -> Self {
        Self::new(
            store,
            index,
            options.query.clone(),
            options.page_size,
            options.scroll_keepalive(),
            options.sleep_duration(),
        )
    }

    /// Total matches reported by the store, once the first page is in.
    pub fn reported_total(&self) -> Option<u64> {
        self.reported_total
    }

    /// Fetches the next page; `None` once a page comes back empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or a non-empty page has no cursor.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Hit>>> {
        let page = match &self.state {
            ScrollState::Finished => return Ok(None),
            ScrollState::Initiating => {
                let page = self
                    .store
                    .search(self.index, &self.query, self.page_size, &self.keepalive)
                    .await?;
                self.reported_total = page.total();
                page
            }
            ScrollState::Scrolling { scroll_id } => {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.store.scroll(scroll_id, &self.keepalive).await?
            }
        };
        self.advance(page).await
    }

    async fn advance(&mut self, page: SearchPage) -> Result<Option<Vec<Hit>>> {
        let SearchPage { scroll_id, hits } = page;
        if hits.hits.is_empty() {
            self.state = ScrollState::Finished;
            if let Some(scroll_id) = scroll_id {
                if let Err(e) = self.store.clear_scroll(&scroll_id).await {
                    warn!("Failed to release scroll cursor: {}", e);
                }
            }
            return Ok(None);
        }

        let scroll_id = scroll_id.ok_or_else(|| {
            Error::Response("search response carried hits but no _scroll_id".to_string())
        })?;
        self.state = ScrollState::Scrolling { scroll_id };
        Ok(Some(hits.hits))
    }

    /// Writes every remaining document as one JSON line, without `_index`
    /// and `_score`.
    ///
    /// # Errors
    ///
    /// Returns an error if a request or a write fails.
    pub async fn export<W: Write>(
        mut self,
        mut writer: W,
        progress: &ProgressBar,
    ) -> Result<ExportStats> {
        let mut stats = ExportStats::default();

        while let Some(hits) = self.next_page().await? {
            if stats.pages == 0 {
                if let Some(total) = self.reported_total {
                    progress.set_length(total);
                }
            }
            let count = hits.len() as u64;
            for mut hit in hits {
                for field in TRANSIENT_FIELDS {
                    hit.remove(field);
                }
                serde_json::to_writer(&mut writer, &hit)?;
                writer.write_all(b"\n")?;
            }
            stats.pages += 1;
            stats.documents += count;
            progress.inc(count);
            info!("got batch of {} (total: {})", count, stats.documents);
        }

        writer.flush()?;
        stats.reported_total = self.reported_total;
        Ok(stats)
    }
}

/// Exports `index` into a new `<index>-<date>` directory under
/// `options.backup_dir`.
///
/// The directory is created before any request is made; an existing one
/// aborts with [`Error::BackupDirExists`].
///
/// # Errors
///
/// Returns the first failure; files already written stay on disk.
pub async fn run_backup<S>(
    store: &S,
    index: &str,
    options: &BackupOptions,
    date: NaiveDate,
) -> Result<BackupReport>
where
    S: IndexStore + ?Sized,
{
    options.validate()?;
    if index.trim().is_empty() {
        return Err(Error::Config("index name cannot be empty".to_string()));
    }
    let span = info_span!("backup", index = %index);

    async move {
        let dir = BackupDir::create(&options.backup_dir, index, date)?;
        info!("Writing backup to {}", dir.path().display());

        let strip = options.stripped_settings();
        export_settings(store, index, &strip, create_file(dir.settings_path())?).await?;

        let mappings = export_mappings(store, index, create_file(dir.mappings_path())?).await?;

        let pipelines = export_pipelines(store, &mappings).await?;
        if !pipelines.is_empty() {
            let mut writer = create_file(dir.ingest_path())?;
            serde_json::to_writer(&mut writer, &pipelines)?;
            writer.flush()?;
            info!("Wrote {} ingest pipelines", pipelines.len());
        }

        let progress = create_progress_bar(None, options.progress);
        let documents = ScrollReader::from_options(store, index, options)
            .export(create_file(dir.documents_path())?, &progress)
            .await?;
        progress.finish_and_clear();

        info!("Backup can be found at {}", dir.path().display());
        Ok(BackupReport {
            dir: dir.path().to_path_buf(),
            pipelines: pipelines.len(),
            documents,
        })
    }
    .instrument(span)
    .await
}

fn create_file(path: PathBuf) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
