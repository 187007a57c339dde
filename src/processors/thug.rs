//! Dynamic analysis with Thug.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{Processor, ProcessorRegistry, ProcessorReport};
use crate::backends::thug::DEFAULT_THUG_TIMEOUT;
use crate::backends::{SandboxAnalyzer, ThugCommand};
use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::model::attachment::Attachment;

/// Processor name and result key.
pub const NAME: &str = "thug";

/// `[processors.thug]` options.
#[derive(Debug, Clone, Deserialize)]
pub struct ThugOptions {
    /// Only attachments with one of these extensions (e.g. `".js"`) are run.
    pub extensions: Vec<String>,
    /// Honour `is_filtered` on nested files too.
    #[serde(default = "default_true")]
    pub respect_nested_filter: bool,
    /// Sandbox executable.
    #[serde(default = "default_program")]
    pub program: String,
    /// Extra arguments placed before the per-run flags.
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds a single sandbox run may take before it is killed.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_program() -> String {
    "thug".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_THUG_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

/// Runs matching attachments, and their nested files, in the sandbox.
pub struct ThugProcessor {
    sandbox: Box<dyn SandboxAnalyzer>,
}

impl ThugProcessor {
    pub fn new(sandbox: Box<dyn SandboxAnalyzer>) -> Self {
        Self { sandbox }
    }

    fn analyze(&self, att: &mut Attachment, config: &Value, report: &mut ProcessorReport) {
        match self.sandbox.analyze(att, config) {
            Ok(result) => {
                att.set_result(NAME, result);
                report.enriched += 1;
            }
            Err(e) => {
                warn!(filename = ?att.filename, error = %e, "Sandbox analysis failed");
                att.set_error(NAME, e.to_string());
                report.failed += 1;
            }
        }
    }
}

impl Processor for ThugProcessor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, config: &ProcessorConfig) -> Result<()> {
        config.typed_options::<ThugOptions>(NAME).map(|_| ())
    }

    fn process(
        &self,
        config: &ProcessorConfig,
        attachments: &mut [Attachment],
    ) -> Result<ProcessorReport> {
        let options: ThugOptions = config.typed_options(NAME)?;
        let full_config = config.to_value();
        let mut report = ProcessorReport::default();

        for att in attachments.iter_mut() {
            if att.is_filtered {
                report.filtered += 1;
                continue;
            }
            if options.extensions.contains(&att.extension) {
                self.analyze(att, &full_config, &mut report);
            }

            for file in att.files.iter_mut() {
                if options.respect_nested_filter && file.is_filtered {
                    report.filtered += 1;
                    continue;
                }
                if options.extensions.contains(&file.extension) {
                    self.analyze(file, &full_config, &mut report);
                }
            }
        }

        Ok(report)
    }
}

/// Register the Thug processor built from `config`, or drop it when the
/// configuration disables it.
pub fn register(registry: &mut ProcessorRegistry, config: &ProcessorConfig) -> Result<()> {
    if !config.enabled {
        registry.unregister(NAME);
        return Ok(());
    }
    let options: ThugOptions = config.typed_options(NAME)?;
    let sandbox = ThugCommand::new(options.program, options.args)
        .with_timeout(Duration::from_secs(options.timeout_secs.max(1)));
    registry.register(Box::new(ThugProcessor::new(Box::new(sandbox))), true);
    Ok(())
}
