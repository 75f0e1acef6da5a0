//! Import side: index shell, ingest pipelines and batched bulk writes.
//!
//! Documents are grouped into batches of consecutive records sharing a
//! document type; a type change always closes the current batch, so each bulk
//! request can be routed through at most one `<type>-pipeline`.

use indicatif::ProgressBar;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

use crate::artifacts::{pipeline_id, BackupArtifacts};
use crate::config::RestoreOptions;
use crate::error::{Error, Result};
use crate::progress::create_progress_bar;
use crate::store::IndexStore;

/// Bulk import statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    /// Bulk requests sent.
    pub batches: u64,
    /// Documents written.
    pub documents: u64,
}

/// Ingest pipeline registration outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Pipelines created on the destination.
    pub registered: usize,
    /// Pipelines left alone because the destination already had them.
    pub existing: usize,
}

/// Outcome of a full restore.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// Mapped document types applied.
    pub mappings: usize,
    /// Ingest pipelines.
    pub pipelines: PipelineReport,
    /// Documents.
    pub documents: ImportStats,
}

/// One document ready for a bulk `create`.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRecord {
    /// Envelope minus `_source`: `_id`, `_type` and any other metadata.
    pub header: Map<String, Value>,
    /// Document body.
    pub source: Value,
}

impl BulkRecord {
    /// Splits a stored line into header and source.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a JSON object or has no `_source`.
    pub fn parse(line: &str, line_no: usize) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedDocument {
            line: line_no,
            reason,
        };
        let value: Value = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(mut header) = value else {
            return Err(malformed("expected a JSON object".to_string()));
        };
        let source = header
            .remove("_source")
            .ok_or_else(|| malformed("missing _source".to_string()))?;
        Ok(Self { header, source })
    }

    /// The record's document type label, if any.
    #[must_use]
    pub fn doc_type(&self) -> Option<&str> {
        self.header.get("_type").and_then(Value::as_str)
    }
}

/// Consecutive records of one document type, at most the batch cap long.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Shared document type label.
    pub doc_type: Option<String>,
    /// Records in input order.
    pub records: Vec<BulkRecord>,
}

impl Batch {
    fn start(record: BulkRecord) -> Self {
        Self {
            doc_type: record.doc_type().map(String::from),
            records: vec![record],
        }
    }

    fn accepts(&self, record: &BulkRecord) -> bool {
        self.doc_type.as_deref() == record.doc_type()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `<type>-pipeline` if the destination has it, else no pipeline.
    #[must_use]
    pub fn pipeline(&self, pipelines: &BTreeMap<String, Value>) -> Option<String> {
        let id = pipeline_id(self.doc_type.as_deref()?);
        pipelines.contains_key(&id).then_some(id)
    }

    /// Renders the NDJSON bulk payload: a `create` header line followed by
    /// the source line, per record.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be serialized.
    pub fn to_bulk_body(&self) -> Result<String> {
        let mut body = String::new();
        for record in &self.records {
            body.push_str(&serde_json::to_string(
                &serde_json::json!({ "create": record.header }),
            )?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&record.source)?);
            body.push('\n');
        }
        Ok(body)
    }
}

/// Groups a line-delimited document stream into [`Batch`]es.
///
/// Blank lines are skipped. Iteration stops after the first error.
pub struct DocumentBatches<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    batch_size: usize,
    pending: Option<BulkRecord>,
    failed: bool,
}

impl<R: BufRead> DocumentBatches<R> {
    /// Creates a batcher capping batches at `batch_size` records (minimum 1).
    pub fn new(reader: R, batch_size: usize) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            batch_size: batch_size.max(1),
            pending: None,
            failed: false,
        }
    }

    fn read_record(&mut self) -> Option<Result<BulkRecord>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(BulkRecord::parse(&line, self.line_no));
        }
        None
    }
}

impl<R: BufRead> Iterator for DocumentBatches<R> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut batch = self.pending.take().map(Batch::start);

        loop {
            if batch.as_ref().is_some_and(|b| b.len() >= self.batch_size) {
                return batch.map(Ok);
            }
            let record = match self.read_record() {
                None => return batch.map(Ok),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                Some(Ok(record)) => record,
            };
            match batch.as_mut() {
                None => batch = Some(Batch::start(record)),
                Some(current) if current.accepts(&record) => current.records.push(record),
                Some(_) => {
                    self.pending = Some(record);
                    return batch.map(Ok);
                }
            }
        }
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Creates `index` bare, applies settings while closed, reopens it and applies
/// every mapping. Each step waits for the previous one to settle.
///
/// # Errors
///
/// Returns the first failing step.
pub async fn restore_index_shell<S>(
    store: &S,
    index: &str,
    settings: &Value,
    mappings: &[(String, Value)],
    options: &RestoreOptions,
) -> Result<()>
where
    S: IndexStore + ?Sized,
{
    let delay = options.settle_duration();

    info!("Create index {}", index);
    store.create_index(index, None).await?;
    settle(delay).await;

    store.close_index(index).await?;
    settle(delay).await;

    info!("Apply settings");
    store.put_settings(index, settings).await?;
    settle(delay).await;

    store.open_index(index).await?;
    settle(delay).await;
    store.wait_for_ready(index, options.ready_timeout()).await?;

    for (doc_type, mapping) in mappings {
        info!("Apply mapping for {}", doc_type);
        store.put_mapping(index, doc_type, mapping).await?;
        settle(delay).await;
    }
    Ok(())
}

/// Registers every pipeline the destination does not define yet. Existing
/// pipelines are never overwritten, so running this twice is harmless.
///
/// # Errors
///
/// Returns an error if a lookup fails for a reason other than absence, or a
/// registration fails.
pub async fn register_pipelines<S>(
    store: &S,
    pipelines: &BTreeMap<String, Value>,
) -> Result<PipelineReport>
where
    S: IndexStore + ?Sized,
{
    let mut report = PipelineReport::default();
    for (id, definition) in pipelines {
        match store.get_pipeline(id).await? {
            Some(_) => {
                info!("Ingest pipeline {} already exists, keeping it", id);
                report.existing += 1;
            }
            None => {
                info!("Register ingest pipeline {}", id);
                store.put_pipeline(id, definition).await?;
                report.registered += 1;
            }
        }
    }
    Ok(report)
}

/// Sends one bulk request per batch, routing each through its type's
/// pipeline when one is known. Halts on the first response reporting errors.
///
/// # Errors
///
/// Returns [`Error::BulkRejected`] on a rejected batch, or the first read or
/// request failure.
pub async fn import_documents<S, I>(
    store: &S,
    index: &str,
    batches: I,
    pipelines: &BTreeMap<String, Value>,
    progress: &ProgressBar,
) -> Result<ImportStats>
where
    S: IndexStore + ?Sized,
    I: IntoIterator<Item = Result<Batch>>,
{
    let mut stats = ImportStats::default();

    for batch in batches {
        let batch = batch?;
        let pipeline = batch.pipeline(pipelines);
        debug!(
            "batch {} of {:?}: {} records, pipeline {:?}",
            stats.batches + 1,
            batch.doc_type,
            batch.len(),
            pipeline
        );

        let response = store
            .bulk(index, batch.to_bulk_body()?, pipeline.as_deref())
            .await?;
        stats.batches += 1;
        if response.errors {
            return Err(Error::BulkRejected {
                batch: stats.batches,
                response: response.body.to_string(),
            });
        }

        stats.documents += batch.len() as u64;
        progress.inc(batch.len() as u64);
        info!("uploaded {} (total: {})", batch.len(), stats.documents);
    }
    Ok(stats)
}

/// Restores the backup in `options.backup_dir` into a new `index`.
///
/// Artifacts are checked and parsed, and the destination is checked for
/// absence, before anything is written.
///
/// # Errors
///
/// Precondition failures ([`Error::is_precondition`]) leave the destination
/// untouched; any later failure aborts the restore where it happened.
pub async fn run_restore<S>(store: &S, index: &str, options: &RestoreOptions) -> Result<RestoreReport>
where
    S: IndexStore + ?Sized,
{
    options.validate()?;
    if index.trim().is_empty() {
        return Err(Error::Config("index name cannot be empty".to_string()));
    }
    let span = info_span!("restore", index = %index);

    async move {
        let dir = options
            .backup_dir
            .as_deref()
            .ok_or_else(|| Error::Config("backup directory is required".to_string()))?;
        let artifacts = BackupArtifacts::locate(dir)?;
        let settings = artifacts.load_settings()?;
        let mappings = artifacts.load_mappings()?;
        let pipelines = artifacts.load_pipelines()?;

        if store.index_exists(index).await? {
            return Err(Error::IndexExists(index.to_string()));
        }

        restore_index_shell(store, index, &settings, &mappings, options).await?;
        let pipeline_report = register_pipelines(store, &pipelines).await?;

        let reader = BufReader::new(File::open(&artifacts.documents)?);
        let progress = create_progress_bar(None, options.progress);
        let documents = import_documents(
            store,
            index,
            DocumentBatches::new(reader, options.batch_size),
            &pipelines,
            &progress,
        )
        .await?;
        progress.finish_and_clear();

        info!(
            "Restore complete: {} documents in {} batches",
            documents.documents, documents.batches
        );
        Ok(RestoreReport {
            mappings: mappings.len(),
            pipelines: pipeline_report,
            documents,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
