//! Analysis backends behind the attachment processors.
//!
//! Processors only depend on the traits below. The concrete clients talk
//! to a Tika server, the VirusTotal public API and a local Thug install.

pub mod thug;
pub mod tika;
pub mod virustotal;

use serde_json::Value;

use crate::error::BackendError;
use crate::model::attachment::Attachment;

pub use thug::ThugCommand;
pub use tika::TikaServer;
pub use virustotal::VirusTotalApi;

/// Extracts text and metadata from a document.
pub trait ContentExtractor {
    /// `payload` is always base64.
    fn extract(&self, payload: &str) -> Result<Value, BackendError>;
}

/// Looks up the reputation of a file by hash.
pub trait ReputationLookup {
    /// Raw report for `sha1`, exactly as the service returned it.
    fn file_report(&self, sha1: &str) -> Result<Value, BackendError>;
}

/// Runs an attachment in a dynamic-analysis sandbox.
pub trait SandboxAnalyzer {
    /// `config` is the processor's whole configuration, unknown keys included.
    fn analyze(&self, attachment: &Attachment, config: &Value) -> Result<Value, BackendError>;
}

/// Map a `reqwest` transport error.
pub(crate) fn request_error(e: reqwest::Error) -> BackendError {
    BackendError::Request(e.to_string())
}
