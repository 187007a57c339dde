//! Attachment processors.
//!
//! A processor is a named enrichment step. It reads the attachments it
//! cares about, asks its backend for an analysis and stores the answer
//! under its own key. Processors never touch each other's keys, so the
//! order they run in does not matter.
//!
//! Every processor module exposes a `register` function; [`build_registry`]
//! calls them for the processors named in the configuration.

pub mod pipeline;
pub mod registry;
pub mod thug;
pub mod tika;
pub mod virustotal;

use std::borrow::Cow;
use std::time::Duration;

use tracing::warn;

use crate::config::{ProcessorConfig, ProcessorsConfig};
use crate::error::Result;
use crate::model::attachment::{Attachment, TransferEncoding};

pub use pipeline::{Pipeline, PipelineReport};
pub use registry::ProcessorRegistry;

/// A named, independently toggleable enrichment step.
pub trait Processor {
    /// Name of the processor; also its configuration section and result key.
    fn name(&self) -> &'static str;

    /// Transfer encoding the processor's backend expects payloads in.
    /// `None` means the payload is used as stored.
    fn required_encoding(&self) -> Option<TransferEncoding> {
        None
    }

    /// Check that the processor's options are well formed.
    fn validate(&self, config: &ProcessorConfig) -> Result<()>;

    /// Enrich `attachments` in place.
    ///
    /// Backend failures are recorded on the attachment they concern and do
    /// not end the run; an `Err` means the processor could not run at all.
    fn process(
        &self,
        config: &ProcessorConfig,
        attachments: &mut [Attachment],
    ) -> Result<ProcessorReport>;
}

/// Counters for one processor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorReport {
    /// Attachments that received a result.
    pub enriched: usize,
    /// Attachments skipped because they were filtered.
    pub filtered: usize,
    /// Attachments the backend had nothing to say about.
    pub empty: usize,
    /// Attachments whose backend call failed.
    pub failed: usize,
}

/// The payload of `att` in the encoding `processor` declares.
///
/// The record is not modified; its `content_transfer_encoding` keeps
/// describing what the parser stored.
pub fn payload_for<'a>(processor: &dyn Processor, att: &'a Attachment) -> Result<Cow<'a, str>> {
    match processor.required_encoding() {
        Some(encoding) => att.payload_as(encoding),
        None => Ok(Cow::Borrowed(att.payload.as_str())),
    }
}

/// Build a registry holding every enabled processor in `config`, each
/// with its concrete backend.
pub fn build_registry(config: &ProcessorsConfig, timeout: Duration) -> Result<ProcessorRegistry> {
    let mut registry = ProcessorRegistry::new();
    for (name, conf) in config {
        match name.as_str() {
            tika::NAME => tika::register(&mut registry, conf, timeout)?,
            virustotal::NAME => virustotal::register(&mut registry, conf, timeout)?,
            thug::NAME => thug::register(&mut registry, conf)?,
            other => warn!(processor = %other, "Unknown processor in configuration, ignored"),
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    use crate::backends::ContentExtractor;
    use crate::error::BackendError;

    struct Declares(Option<TransferEncoding>);

    impl Processor for Declares {
        fn name(&self) -> &'static str {
            "declares"
        }
        fn required_encoding(&self) -> Option<TransferEncoding> {
            self.0
        }
        fn validate(&self, _config: &ProcessorConfig) -> Result<()> {
            Ok(())
        }
        fn process(
            &self,
            _config: &ProcessorConfig,
            _attachments: &mut [Attachment],
        ) -> Result<ProcessorReport> {
            Ok(ProcessorReport::default())
        }
    }

    struct NoExtractor;

    impl ContentExtractor for NoExtractor {
        fn extract(&self, _payload: &str) -> std::result::Result<Value, BackendError> {
            Err(BackendError::Status(503))
        }
    }

    fn plain(payload: &str) -> Attachment {
        Attachment {
            payload: payload.to_string(),
            content_transfer_encoding: Some("7bit".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_payload_follows_declared_encoding() {
        let att = plain("hello");

        let base64 = Declares(Some(TransferEncoding::Base64));
        assert_eq!(payload_for(&base64, &att).unwrap(), "aGVsbG8=");

        let as_stored = Declares(None);
        assert_eq!(payload_for(&as_stored, &att).unwrap(), "hello");

        // The record keeps its stored form either way.
        assert_eq!(att.payload, "hello");
        assert_eq!(att.transfer_encoding(), TransferEncoding::Plain);
    }

    #[test]
    fn test_declared_encodings() {
        let tika = tika::TikaProcessor::new(Box::new(NoExtractor));
        assert_eq!(tika.required_encoding(), Some(TransferEncoding::Base64));

        let mut base64 = plain("aGVsbG8=");
        base64.content_transfer_encoding = Some("base64".to_string());
        assert_eq!(payload_for(&tika, &base64).unwrap(), "aGVsbG8=");
        assert_eq!(payload_for(&tika, &plain("hello")).unwrap(), "aGVsbG8=");
    }

    #[test]
    fn test_build_registry_skips_disabled_and_unknown() {
        let mut config = ProcessorsConfig::new();
        config.insert(
            "tika".to_string(),
            ProcessorConfig::enabled_with(json!({"whitelist_cont_types": ["application/pdf"]})),
        );
        config.insert(
            "virustotal".to_string(),
            ProcessorConfig {
                enabled: false,
                ..Default::default()
            },
        );
        config.insert(
            "thug".to_string(),
            ProcessorConfig::enabled_with(json!({"extensions": [".js"]})),
        );
        config.insert("clamav".to_string(), ProcessorConfig::enabled_with(json!({})));

        let registry = build_registry(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(registry.names(), vec!["thug", "tika"]);
    }

    #[test]
    fn test_build_registry_requires_api_key() {
        let mut config = ProcessorsConfig::new();
        config.insert(
            "virustotal".to_string(),
            ProcessorConfig::enabled_with(json!({})),
        );
        assert!(build_registry(&config, Duration::from_secs(5)).is_err());
    }
}
