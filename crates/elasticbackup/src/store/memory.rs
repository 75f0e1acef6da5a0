//! In-memory [`IndexStore`] used by the unit tests.
//!
//! Behaves like a single-node cluster closely enough to exercise ordering:
//! settings only apply to a closed index, mappings only to an open one, and
//! every call is recorded.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::store::{BulkResponse, Hit, Hits, IndexStore, SearchPage, TotalHits};

const MUTATING_OPS: [&str; 8] = [
    "create_index",
    "close_index",
    "open_index",
    "put_settings",
    "put_mapping",
    "put_pipeline",
    "bulk",
    "clear_scroll",
];

/// One bulk request as received.
#[derive(Debug, Clone)]
pub(crate) struct BulkCall {
    pub pipeline: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryIndex {
    pub settings: Value,
    pub mappings: Map<String, Value>,
    pub closed: bool,
    pub docs: Vec<Hit>,
    pub bulks: Vec<BulkCall>,
}

#[derive(Default)]
struct State {
    indices: HashMap<String, MemoryIndex>,
    pipelines: BTreeMap<String, Value>,
    calls: Vec<String>,
    cursors: HashMap<String, (String, usize, usize)>,
    next_cursor: u64,
    bulk_calls: u64,
    fail_bulk_on: Option<u64>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an open index holding `docs` (each an `_id`/`_type`/`_source` envelope).
    pub fn with_index(self, name: &str, settings: Value, mappings: Value, docs: Vec<Value>) -> Self {
        {
            let mut state = self.lock();
            let docs = docs
                .into_iter()
                .filter_map(|d| d.as_object().cloned())
                .collect();
            state.indices.insert(
                name.to_string(),
                MemoryIndex {
                    settings,
                    mappings: mappings.as_object().cloned().unwrap_or_default(),
                    docs,
                    ..Default::default()
                },
            );
        }
        self
    }

    pub fn with_pipeline(self, id: &str, body: Value) -> Self {
        self.lock().pipelines.insert(id.to_string(), body);
        self
    }

    /// Makes the n-th bulk call (1-based) report `errors: true`.
    pub fn failing_bulk(self, n: u64) -> Self {
        self.lock().fail_bulk_on = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| MUTATING_OPS.iter().any(|op| c.split(' ').next() == Some(op)))
            .collect()
    }

    pub fn index(&self, name: &str) -> Option<MemoryIndex> {
        self.lock().indices.get(name).cloned()
    }

    pub fn pipeline(&self, id: &str) -> Option<Value> {
        self.lock().pipelines.get(id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(what: &str) -> Error {
    Error::Http {
        status: 404,
        body: format!("{{\"error\":\"{what} not found\"}}"),
    }
}

fn page(index: &str, docs: &[Hit], from: usize, size: usize, cursor: &str) -> SearchPage {
    let hits = docs
        .iter()
        .skip(from)
        .take(size)
        .map(|d| {
            let mut hit = d.clone();
            hit.insert("_index".to_string(), json!(index));
            hit.insert("_score".to_string(), json!(1.0));
            hit
        })
        .collect();
    SearchPage {
        scroll_id: Some(cursor.to_string()),
        hits: Hits {
            total: Some(TotalHits::Count(docs.len() as u64)),
            hits,
        },
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn get_mapping(&self, index: &str) -> Result<Value> {
        let mut state = self.lock();
        state.calls.push(format!("get_mapping {index}"));
        let idx = state.indices.get(index).ok_or_else(|| not_found(index))?;
        Ok(json!({ index: { "mappings": idx.mappings } }))
    }

    async fn get_settings(&self, index: &str) -> Result<Value> {
        let mut state = self.lock();
        state.calls.push(format!("get_settings {index}"));
        let idx = state.indices.get(index).ok_or_else(|| not_found(index))?;
        Ok(json!({ index: { "settings": { "index": idx.settings } } }))
    }

    async fn search(
        &self,
        index: &str,
        _query: &Value,
        size: usize,
        scroll: &str,
    ) -> Result<SearchPage> {
        let mut state = self.lock();
        state.calls.push(format!("search {index} size={size} scroll={scroll}"));
        let docs = state
            .indices
            .get(index)
            .ok_or_else(|| not_found(index))?
            .docs
            .clone();
        state.next_cursor += 1;
        let cursor = format!("cursor-{}", state.next_cursor);
        state
            .cursors
            .insert(cursor.clone(), (index.to_string(), size, size));
        Ok(page(index, &docs, 0, size, &cursor))
    }

    async fn scroll(&self, scroll_id: &str, scroll: &str) -> Result<SearchPage> {
        let mut state = self.lock();
        state.calls.push(format!("scroll {scroll_id} scroll={scroll}"));
        let (index, offset, size) = state
            .cursors
            .get(scroll_id)
            .cloned()
            .ok_or_else(|| not_found(scroll_id))?;
        let docs = state
            .indices
            .get(&index)
            .ok_or_else(|| not_found(&index))?
            .docs
            .clone();
        state
            .cursors
            .insert(scroll_id.to_string(), (index.clone(), offset + size, size));
        Ok(page(&index, &docs, offset, size, scroll_id))
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("clear_scroll {scroll_id}"));
        state.cursors.remove(scroll_id);
        Ok(())
    }

    async fn bulk(
        &self,
        index: &str,
        body: String,
        pipeline: Option<&str>,
    ) -> Result<BulkResponse> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("bulk {index} pipeline={}", pipeline.unwrap_or("-")));
        state.bulk_calls += 1;
        let failing = state.fail_bulk_on == Some(state.bulk_calls);

        let idx = state.indices.get_mut(index).ok_or_else(|| not_found(index))?;
        idx.bulks.push(BulkCall {
            pipeline: pipeline.map(String::from),
            body: body.clone(),
        });
        if failing {
            return Ok(BulkResponse::from_body(json!({
                "errors": true,
                "items": [{"create": {"status": 409, "error": {"type": "version_conflict_engine_exception"}}}]
            })));
        }

        let lines: Vec<&str> = body.lines().collect();
        for pair in lines.chunks(2) {
            let header: Value = serde_json::from_str(pair[0])?;
            let source: Value = serde_json::from_str(pair.get(1).copied().unwrap_or("{}"))?;
            let mut doc = header
                .get("create")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            doc.insert("_source".to_string(), source);
            idx.docs.push(doc);
        }
        Ok(BulkResponse::from_body(json!({"errors": false, "items": []})))
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.push(format!("index_exists {index}"));
        Ok(state.indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: Option<&Value>) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("create_index {index}"));
        if state.indices.contains_key(index) {
            return Err(Error::Http {
                status: 400,
                body: "resource_already_exists_exception".to_string(),
            });
        }
        let settings = body
            .and_then(|b| b.get("settings"))
            .cloned()
            .unwrap_or_else(|| json!({}));
        state.indices.insert(
            index.to_string(),
            MemoryIndex {
                settings,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn close_index(&self, index: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("close_index {index}"));
        let idx = state.indices.get_mut(index).ok_or_else(|| not_found(index))?;
        idx.closed = true;
        Ok(())
    }

    async fn open_index(&self, index: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("open_index {index}"));
        let idx = state.indices.get_mut(index).ok_or_else(|| not_found(index))?;
        idx.closed = false;
        Ok(())
    }

    async fn put_settings(&self, index: &str, body: &Value) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("put_settings {index}"));
        let idx = state.indices.get_mut(index).ok_or_else(|| not_found(index))?;
        if !idx.closed {
            return Err(Error::Http {
                status: 400,
                body: "Can't update non dynamic settings for open indices".to_string(),
            });
        }
        idx.settings = body.get("settings").cloned().unwrap_or_else(|| body.clone());
        Ok(())
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("put_mapping {index} {doc_type}"));
        let idx = state.indices.get_mut(index).ok_or_else(|| not_found(index))?;
        if idx.closed {
            return Err(Error::Http {
                status: 400,
                body: "index_closed_exception".to_string(),
            });
        }
        idx.mappings.insert(doc_type.to_string(), body.clone());
        Ok(())
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Value>> {
        let mut state = self.lock();
        state.calls.push(format!("get_pipeline {id}"));
        Ok(state.pipelines.get(id).cloned())
    }

    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("put_pipeline {id}"));
        state.pipelines.insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn wait_for_ready(&self, index: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("wait_for_ready {index}"));
        match state.indices.get(index) {
            Some(idx) if !idx.closed => Ok(()),
            _ => Err(Error::Response(format!("index {index} is not open"))),
        }
    }
}
