//! Elasticsearch REST implementation of [`IndexStore`].

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::store::{BulkResponse, IndexStore, SearchPage};

/// Default request timeout. Bulk and scroll calls can be slow on big pages.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Extra time a health request is given beyond the wait it asks the cluster for.
pub const HEALTH_GRACE: Duration = Duration::from_secs(10);

/// Creates a configured HTTP client with the default timeout.
#[must_use]
pub fn create_http_client() -> Client {
    create_http_client_with_timeout(DEFAULT_TIMEOUT)
}

/// Creates a configured HTTP client whose requests give up after `timeout`.
#[must_use]
pub fn create_http_client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Turns `host` or `host:port` into a base URL; full URLs pass through.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Maps a non-success status to an error.
pub fn handle_http_error(status: u16, body: &str) -> Error {
    match status {
        401 | 403 => Error::Authentication(format!("Elasticsearch auth failed: {body}")),
        _ => Error::Http {
            status,
            body: body.to_string(),
        },
    }
}

/// Elasticsearch store reached over HTTP.
pub struct HttpStore {
    base_url: String,
    client: Client,
    credentials: Option<Credentials>,
}

impl HttpStore {
    /// Creates a store for `host`, optionally authenticating every request.
    #[must_use]
    pub fn new(host: &str, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: normalize_host(host),
            client: create_http_client(),
            credentials,
        }
    }

    /// Replaces the per-request timeout of the underlying client.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = create_http_client_with_timeout(timeout);
        self
    }

    /// Base URL every request is built from.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Makes an authenticated request.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);
        let mut req = self.client.request(method, url);
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }
        req
    }

    /// Sends a request and decodes a JSON body, failing on non-success.
    async fn send_json(&self, req: RequestBuilder) -> Result<Value> {
        let response = check_status(req.send().await?).await?;
        read_json(response).await
    }

    /// Sends a request whose response must carry `"acknowledged": true`.
    async fn send_acknowledged(&self, req: RequestBuilder, op: &str) -> Result<()> {
        let body = self.send_json(req).await?;
        expect_acknowledged(op, &body)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(handle_http_error(status.as_u16(), &body))
}

/// Decodes a success body; an empty body is `null`. Failures are reported as
/// bad responses, not transport errors.
async fn read_json(response: Response) -> Result<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| Error::Response(format!("failed to read response body: {e}")))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| Error::Response(format!("invalid JSON body: {e}")))
}

fn expect_acknowledged(op: &str, body: &Value) -> Result<()> {
    match body.get("acknowledged").and_then(Value::as_bool) {
        Some(false) => Err(Error::Response(format!("{op} was not acknowledged: {body}"))),
        _ => Ok(()),
    }
}

#[async_trait]
impl IndexStore for HttpStore {
    async fn get_mapping(&self, index: &str) -> Result<Value> {
        self.send_json(self.request(Method::GET, &format!("{index}/_mapping")))
            .await
    }

    async fn get_settings(&self, index: &str) -> Result<Value> {
        self.send_json(self.request(Method::GET, &format!("{index}/_settings")))
            .await
    }

    async fn search(
        &self,
        index: &str,
        query: &Value,
        size: usize,
        scroll: &str,
    ) -> Result<SearchPage> {
        let req = self
            .request(Method::POST, &format!("{index}/_search"))
            .query(&[("scroll", scroll.to_string()), ("size", size.to_string())])
            .json(query);
        let body = self.send_json(req).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn scroll(&self, scroll_id: &str, scroll: &str) -> Result<SearchPage> {
        let req = self
            .request(Method::POST, "_search/scroll")
            .json(&serde_json::json!({ "scroll": scroll, "scroll_id": scroll_id }));
        let body = self.send_json(req).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let req = self
            .request(Method::DELETE, "_search/scroll")
            .json(&serde_json::json!({ "scroll_id": [scroll_id] }));
        let response = req.send().await?;
        // Already expired cursors answer 404.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn bulk(
        &self,
        index: &str,
        body: String,
        pipeline: Option<&str>,
    ) -> Result<BulkResponse> {
        let mut req = self
            .request(Method::POST, &format!("{index}/_bulk"))
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        if let Some(pipeline) = pipeline {
            req = req.query(&[("pipeline", pipeline)]);
        }
        let body = self.send_json(req).await?;
        Ok(BulkResponse::from_body(body))
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.request(Method::HEAD, index).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(handle_http_error(status.as_u16(), "")),
        }
    }

    async fn create_index(&self, index: &str, body: Option<&Value>) -> Result<()> {
        let mut req = self.request(Method::PUT, index);
        if let Some(body) = body {
            req = req.json(body);
        }
        self.send_acknowledged(req, "create index").await
    }

    async fn close_index(&self, index: &str) -> Result<()> {
        let req = self.request(Method::POST, &format!("{index}/_close"));
        self.send_acknowledged(req, "close index").await
    }

    async fn open_index(&self, index: &str) -> Result<()> {
        let req = self.request(Method::POST, &format!("{index}/_open"));
        self.send_acknowledged(req, "open index").await
    }

    async fn put_settings(&self, index: &str, body: &Value) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("{index}/_settings"))
            .json(body);
        self.send_acknowledged(req, "put settings").await
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("{index}/_mapping/{doc_type}"))
            .json(body);
        self.send_acknowledged(req, "put mapping").await
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Value>> {
        let response = self
            .request(Method::GET, &format!("_ingest/pipeline/{id}"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_json(check_status(response).await?).await?;
        Ok(body.get(id).cloned())
    }

    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<()> {
        let req = self
            .request(Method::PUT, &format!("_ingest/pipeline/{id}"))
            .json(body);
        self.send_acknowledged(req, "put pipeline").await
    }

    async fn wait_for_ready(&self, index: &str, timeout: Duration) -> Result<()> {
        let req = self
            .request(Method::GET, &format!("_cluster/health/{index}"))
            .query(&[
                ("wait_for_status", "yellow".to_string()),
                ("timeout", format!("{}s", timeout.as_secs().max(1))),
            ])
            // The cluster holds the response for up to `timeout`.
            .timeout(timeout + HEALTH_GRACE);
        let body = self.send_json(req).await?;
        if body.get("timed_out").and_then(Value::as_bool) == Some(true) {
            return Err(Error::Response(format!(
                "index {index} did not become ready within {}s: {body}",
                timeout.as_secs()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
