//! Runs the registered processors over a batch of attachments.

use tracing::{debug, error, info};

use super::{ProcessorRegistry, ProcessorReport};
use crate::config::ProcessorsConfig;
use crate::error::Result;
use crate::model::attachment::Attachment;

/// What happened to each registered processor during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Processors that ran to completion.
    pub completed: Vec<(&'static str, ProcessorReport)>,
    /// Processors whose configuration has `enabled = false`.
    pub disabled: Vec<&'static str>,
    /// Processors with no configuration section.
    pub unconfigured: Vec<&'static str>,
    /// Processors that could not run, with the reason.
    pub failed: Vec<(&'static str, String)>,
}

impl PipelineReport {
    /// Counters of a completed processor.
    pub fn processor(&self, name: &str) -> Option<&ProcessorReport> {
        self.completed
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, report)| report)
    }
}

/// Attachment enrichment pipeline over a fixed registry.
pub struct Pipeline<'a> {
    registry: &'a ProcessorRegistry,
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a ProcessorRegistry) -> Self {
        Self { registry }
    }

    /// Apply every registered, configured and enabled processor to
    /// `attachments`, in registry order.
    ///
    /// Options of all selected processors are validated before any of them
    /// runs, so a configuration error leaves the attachments untouched. Once
    /// running, a processor that fails is reported and the next one still
    /// runs.
    pub fn run(
        &self,
        config: &ProcessorsConfig,
        attachments: &mut [Attachment],
    ) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        let mut selected = Vec::new();

        for processor in self.registry.active_processors() {
            let name = processor.name();
            match config.get(name) {
                None => {
                    debug!(processor = name, "No configuration, skipping");
                    report.unconfigured.push(name);
                }
                Some(conf) if !conf.enabled => {
                    debug!(processor = name, "Disabled, skipping");
                    report.disabled.push(name);
                }
                Some(conf) => selected.push((processor, conf)),
            }
        }

        for (processor, conf) in &selected {
            processor.validate(conf)?;
        }

        for (processor, conf) in selected {
            let name = processor.name();
            match processor.process(conf, attachments) {
                Ok(counts) => {
                    info!(
                        processor = name,
                        enriched = counts.enriched,
                        filtered = counts.filtered,
                        empty = counts.empty,
                        failed = counts.failed,
                        "Processor finished"
                    );
                    report.completed.push((name, counts));
                }
                Err(e) => {
                    error!(processor = name, error = %e, "Processor failed");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}
