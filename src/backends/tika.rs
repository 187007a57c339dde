//! Apache Tika server client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;

use super::{request_error, ContentExtractor};
use crate::error::BackendError;
use crate::model::attachment::decode_base64;

/// Default address of a local `tika-server`.
pub const DEFAULT_TIKA_URL: &str = "http://localhost:9998";

/// Sends documents to the recursive-metadata endpoint of a Tika server.
pub struct TikaServer {
    base_url: String,
    http: Client,
}

impl TikaServer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(request_error)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl ContentExtractor for TikaServer {
    fn extract(&self, payload: &str) -> Result<Value, BackendError> {
        let data = decode_base64(payload).map_err(|e| BackendError::Payload(e.to_string()))?;
        let url = format!("{}/rmeta/text", self.base_url);
        debug!(url = %url, bytes = data.len(), "Sending document to Tika");

        let response = self
            .http
            .put(&url)
            .header(ACCEPT, "application/json")
            .body(data)
            .send()
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        response
            .json::<Value>()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
