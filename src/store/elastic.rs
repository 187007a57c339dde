//! Blocking HTTP client for Elasticsearch.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use super::{index_or_all, IndexStore, SampleQuery};
use crate::error::StoreError;

/// Default Elasticsearch HTTP port, used when the host has none.
const DEFAULT_PORT: u16 = 9200;

/// Elasticsearch REST client.
pub struct ElasticClient {
    base_url: String,
    http: Client,
}

impl ElasticClient {
    /// Build a client for `host` (e.g. `"elasticsearch"`, `"es:9201"`,
    /// `"https://es.example.com"`).
    pub fn new(host: &str, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: normalize_host(host),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl IndexStore for ElasticClient {
    fn search(
        &self,
        index: &str,
        query: &SampleQuery,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let url = self.url(&format!("{}/_search", index_or_all(index)));
        debug!(url = %url, field = %query.field, "Searching samples");
        let response = self
            .http
            .post(&url)
            .json(&query.to_body(limit))
            .send()
            .map_err(transport_error)?;
        let body: Value = check_status(response)?
            .json()
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        extract_sources(&body)
    }

    fn put_settings(&self, index: &str, settings: &Value) -> Result<(), StoreError> {
        let url = self.url(&format!("{}/_settings", index_or_all(index)));
        debug!(url = %url, "Putting index settings");
        let response = self
            .http
            .put(&url)
            .json(settings)
            .send()
            .map_err(transport_error)?;
        check_status(response).map(|_| ())
    }

    fn put_template(&self, name: &str, body: &str) -> Result<(), StoreError> {
        let url = self.url(&format!("_template/{name}"));
        debug!(url = %url, "Putting index template");
        let response = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(transport_error)?;
        check_status(response).map(|_| ())
    }
}

/// Add a scheme and the default port when missing.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let (scheme, rest) = match host.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", host),
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.contains(':') {
        format!("{scheme}://{rest}")
    } else {
        format!("{scheme}://{authority}:{DEFAULT_PORT}{}", &rest[authority.len()..])
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::InvalidResponse(e.to_string())
    }
}

fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        Err(StoreError::NotFound(url))
    } else {
        Err(StoreError::Request {
            status: status.as_u16(),
            body,
        })
    }
}

/// Pull `hits.hits[]._source` out of a search response.
fn extract_sources(body: &Value) -> Result<Vec<Value>, StoreError> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::InvalidResponse("missing hits.hits".to_string()))?;
    Ok(hits
        .iter()
        .filter_map(|hit| hit.get("_source").cloned())
        .collect())
}
