//! The remote index store both tools talk to.
//!
//! [`IndexStore`] is the narrow capability the pipelines consume; [`HttpStore`]
//! implements it against the Elasticsearch REST API.

pub mod http;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::Result;

pub use http::HttpStore;

/// One retrieved record: `_id`, `_type`, `_source` and whatever other
/// metadata the store attaches.
pub type Hit = Map<String, Value>;

/// One page of a scrolled search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    /// Cursor for the next page.
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,
    /// Matching records.
    pub hits: Hits,
}

/// The `hits` section of a search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hits {
    /// Total matches reported by the store.
    #[serde(default)]
    pub total: Option<TotalHits>,
    /// Records on this page.
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// `hits.total` is a bare number before 7.x and an object after.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    /// Pre-7.x form.
    Count(u64),
    /// 7.x+ form.
    Object {
        /// Match count (may be a lower bound).
        value: u64,
    },
}

impl TotalHits {
    /// The reported count.
    #[must_use]
    pub const fn value(self) -> u64 {
        match self {
            Self::Count(v) | Self::Object { value: v } => v,
        }
    }
}

impl SearchPage {
    /// Total reported by the store, if any.
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.hits.total.map(TotalHits::value)
    }
}

/// Result of a bulk write.
#[derive(Debug, Clone)]
pub struct BulkResponse {
    /// Top-level error indicator: at least one item was rejected.
    pub errors: bool,
    /// The full response body, kept for reporting.
    pub body: Value,
}

impl BulkResponse {
    /// Builds a response from a decoded body.
    #[must_use]
    pub fn from_body(body: Value) -> Self {
        let errors = body.get("errors").and_then(Value::as_bool).unwrap_or(false);
        Self { errors, body }
    }
}

/// Operations the backup and restore pipelines need from the store.
///
/// Every call is awaited before the next is issued; implementations never
/// see two requests in flight from the same pipeline.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Raw mapping document keyed by index name.
    async fn get_mapping(&self, index: &str) -> Result<Value>;

    /// Settings document keyed by index name.
    async fn get_settings(&self, index: &str) -> Result<Value>;

    /// Opens a scroll cursor and returns the first page.
    async fn search(
        &self,
        index: &str,
        query: &Value,
        size: usize,
        scroll: &str,
    ) -> Result<SearchPage>;

    /// Exchanges a cursor for the next page.
    async fn scroll(&self, scroll_id: &str, scroll: &str) -> Result<SearchPage>;

    /// Releases a cursor before its lifetime runs out.
    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;

    /// Sends an NDJSON bulk payload, optionally through an ingest pipeline.
    async fn bulk(&self, index: &str, body: String, pipeline: Option<&str>)
        -> Result<BulkResponse>;

    /// Whether the index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Creates an index, with or without a body.
    async fn create_index(&self, index: &str, body: Option<&Value>) -> Result<()>;

    /// Closes an index.
    async fn close_index(&self, index: &str) -> Result<()>;

    /// Opens a closed index.
    async fn open_index(&self, index: &str) -> Result<()>;

    /// Applies index settings.
    async fn put_settings(&self, index: &str, body: &Value) -> Result<()>;

    /// Applies the mapping of one document type.
    async fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> Result<()>;

    /// Looks up an ingest pipeline; `None` when it is not defined.
    async fn get_pipeline(&self, id: &str) -> Result<Option<Value>>;

    /// Registers an ingest pipeline.
    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<()>;

    /// Blocks until the index can serve requests or `timeout` elapses.
    async fn wait_for_ready(&self, index: &str, timeout: Duration) -> Result<()>;
}
