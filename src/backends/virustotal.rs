//! VirusTotal public API (v2) client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::{request_error, ReputationLookup};
use crate::error::BackendError;

/// Public API endpoint.
pub const DEFAULT_VIRUSTOTAL_URL: &str = "https://www.virustotal.com/vtapi/v2";

/// Fetches file reports by hash.
pub struct VirusTotalApi {
    base_url: String,
    api_key: String,
    http: Client,
}

impl VirusTotalApi {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(request_error)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }
}

impl ReputationLookup for VirusTotalApi {
    fn file_report(&self, sha1: &str) -> Result<Value, BackendError> {
        let url = format!("{}/file/report", self.base_url);
        debug!(resource = %sha1, "Requesting VirusTotal file report");

        let response = self
            .http
            .get(&url)
            .query(&[("apikey", self.api_key.as_str()), ("resource", sha1)])
            .send()
            .map_err(request_error)?;

        // 204 is the public API's "request rate limit exceeded".
        let status = response.status();
        if status == StatusCode::NO_CONTENT || !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        response
            .json::<Value>()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
