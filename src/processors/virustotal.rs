//! Reputation lookup with VirusTotal.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{Processor, ProcessorRegistry, ProcessorReport};
use crate::backends::virustotal::DEFAULT_VIRUSTOTAL_URL;
use crate::backends::{ReputationLookup, VirusTotalApi};
use crate::config::ProcessorConfig;
use crate::error::{Result, ScopeError};
use crate::model::attachment::Attachment;

/// Processor name and result key.
pub const NAME: &str = "virustotal";

/// `[processors.virustotal]` options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VirusTotalOptions {
    /// Public API key.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Honour `is_filtered` on nested files as well as on the top-level
    /// attachment. Turn off to check only the top-level flag.
    pub respect_nested_filter: bool,
}

impl Default for VirusTotalOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_VIRUSTOTAL_URL.to_string(),
            respect_nested_filter: true,
        }
    }
}

/// Attaches file reports to attachments and their nested files.
pub struct VirusTotalProcessor {
    lookup: Box<dyn ReputationLookup>,
}

impl VirusTotalProcessor {
    pub fn new(lookup: Box<dyn ReputationLookup>) -> Self {
        Self { lookup }
    }

    fn enrich(&self, att: &mut Attachment, report: &mut ProcessorReport) {
        if att.sha1.is_empty() {
            debug!(filename = ?att.filename, "No sha1, skipping lookup");
            return;
        }
        match self.lookup.file_report(&att.sha1) {
            Ok(raw) => match reformat_virustotal(raw) {
                Some(result) => {
                    att.set_result(NAME, result);
                    report.enriched += 1;
                }
                None => report.empty += 1,
            },
            Err(e) => {
                warn!(sha1 = %att.sha1, error = %e, "VirusTotal lookup failed");
                att.set_error(NAME, e.to_string());
                report.failed += 1;
            }
        }
    }
}

impl Processor for VirusTotalProcessor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, config: &ProcessorConfig) -> Result<()> {
        config.typed_options::<VirusTotalOptions>(NAME).map(|_| ())
    }

    fn process(
        &self,
        config: &ProcessorConfig,
        attachments: &mut [Attachment],
    ) -> Result<ProcessorReport> {
        let options: VirusTotalOptions = config.typed_options(NAME)?;
        let mut report = ProcessorReport::default();

        for att in attachments.iter_mut() {
            if att.is_filtered {
                report.filtered += 1;
                continue;
            }
            self.enrich(att, &mut report);

            for file in att.files.iter_mut() {
                if options.respect_nested_filter && file.is_filtered {
                    report.filtered += 1;
                    continue;
                }
                self.enrich(file, &mut report);
            }
        }

        Ok(report)
    }
}

/// Normalise a raw file report.
///
/// Returns `None` for empty reports and for hashes VirusTotal does not know
/// (`response_code != 1`). The `scans` object, keyed by engine, becomes a
/// list of scans sorted by engine name, each carrying an `antivirus` field.
pub fn reformat_virustotal(raw: Value) -> Option<Value> {
    let Value::Object(mut report) = raw else {
        return None;
    };
    if report.get("response_code").and_then(Value::as_i64) != Some(1) {
        return None;
    }

    if let Some(Value::Object(scans)) = report.remove("scans") {
        let mut list: Vec<(String, Value)> = scans.into_iter().collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        let scans = list
            .into_iter()
            .map(|(engine, scan)| {
                let mut entry = match scan {
                    Value::Object(map) => map,
                    other => {
                        let mut map = Map::new();
                        map.insert("result".to_string(), other);
                        map
                    }
                };
                entry.insert("antivirus".to_string(), Value::String(engine));
                Value::Object(entry)
            })
            .collect();
        report.insert("scans".to_string(), Value::Array(scans));
    }

    Some(Value::Object(report))
}

/// Register the VirusTotal processor built from `config`, or drop it when
/// the configuration disables it.
pub fn register(
    registry: &mut ProcessorRegistry,
    config: &ProcessorConfig,
    timeout: Duration,
) -> Result<()> {
    if !config.enabled {
        registry.unregister(NAME);
        return Ok(());
    }
    let options: VirusTotalOptions = config.typed_options(NAME)?;
    let api_key = options
        .api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ScopeError::Config(format!("[processors.{NAME}]: api_key is required")))?;
    let api = VirusTotalApi::new(&options.base_url, &api_key, timeout)
        .map_err(|e| ScopeError::Config(format!("[processors.{NAME}]: {e}")))?;
    registry.register(Box::new(VirusTotalProcessor::new(Box::new(api))), true);
    Ok(())
}
