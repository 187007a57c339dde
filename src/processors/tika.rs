//! Content extraction with Apache Tika.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use super::{payload_for, Processor, ProcessorRegistry, ProcessorReport};
use crate::backends::tika::DEFAULT_TIKA_URL;
use crate::backends::{ContentExtractor, TikaServer};
use crate::config::ProcessorConfig;
use crate::error::{Result, ScopeError};
use crate::model::attachment::{Attachment, TransferEncoding};

/// Processor name and result key.
pub const NAME: &str = "tika";

/// `[processors.tika]` options.
#[derive(Debug, Clone, Deserialize)]
pub struct TikaOptions {
    /// Only attachments with one of these content types are extracted.
    pub whitelist_cont_types: Vec<String>,
    /// Tika server address.
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

fn default_server_url() -> String {
    DEFAULT_TIKA_URL.to_string()
}

/// Extracts text and metadata from top-level attachments.
pub struct TikaProcessor {
    extractor: Box<dyn ContentExtractor>,
}

impl TikaProcessor {
    pub fn new(extractor: Box<dyn ContentExtractor>) -> Self {
        Self { extractor }
    }
}

impl Processor for TikaProcessor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn required_encoding(&self) -> Option<TransferEncoding> {
        Some(TransferEncoding::Base64)
    }

    fn validate(&self, config: &ProcessorConfig) -> Result<()> {
        config.typed_options::<TikaOptions>(NAME).map(|_| ())
    }

    fn process(
        &self,
        config: &ProcessorConfig,
        attachments: &mut [Attachment],
    ) -> Result<ProcessorReport> {
        let options: TikaOptions = config.typed_options(NAME)?;
        let mut report = ProcessorReport::default();

        for att in attachments.iter_mut() {
            if att.is_filtered {
                report.filtered += 1;
                continue;
            }
            if !options.whitelist_cont_types.contains(&att.content_type) {
                continue;
            }

            let outcome = match payload_for(self, att) {
                Ok(payload) => self.extractor.extract(&payload).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(result) => {
                    att.set_result(NAME, result);
                    report.enriched += 1;
                }
                Err(e) => {
                    warn!(filename = ?att.filename, error = %e, "Tika extraction failed");
                    att.set_error(NAME, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Register the Tika processor built from `config`, or drop it when the
/// configuration disables it.
pub fn register(
    registry: &mut ProcessorRegistry,
    config: &ProcessorConfig,
    timeout: Duration,
) -> Result<()> {
    if !config.enabled {
        registry.unregister(NAME);
        return Ok(());
    }
    let options: TikaOptions = config.typed_options(NAME)?;
    let server = TikaServer::new(&options.server_url, timeout)
        .map_err(|e| ScopeError::Config(format!("[processors.{NAME}]: {e}")))?;
    registry.register(Box::new(TikaProcessor::new(Box::new(server))), true);
    Ok(())
}
