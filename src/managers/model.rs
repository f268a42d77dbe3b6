use tracing::{info, warn};

use crate::error::Result;
use crate::managers::{OutputManager, ProcessingManager, SourcesManager};
use crate::processors::ProcessorRegistry;
use crate::spec::{ModelSpec, Trigger};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Also run models whose trigger is `manual`.
    pub manual: bool,
    /// Process everything but write nothing.
    pub dry_run: bool,
    /// Drop the output and its watermarks before processing.
    pub reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Manual model skipped because manual runs were not requested.
    Gated,
    Completed { rows: usize },
    DryRun { rows: usize },
}

/// Runs one model end to end: load, process, inject, enforce, persist.
pub struct ModelManager<'r> {
    spec: &'r ModelSpec,
    registry: &'r ProcessorRegistry,
}

impl<'r> ModelManager<'r> {
    pub fn new(spec: &'r ModelSpec, registry: &'r ProcessorRegistry) -> Self {
        Self { spec, registry }
    }

    pub fn spec(&self) -> &ModelSpec {
        self.spec
    }

    /// `rows` in the outcome counts the rows produced by this run's processor.
    pub fn run(&self, options: RunOptions) -> Result<RunOutcome> {
        let spec = self.spec;
        if spec.trigger == Trigger::Manual && !options.manual {
            info!("model '{}' has a manual trigger, skipping", spec.name);
            return Ok(RunOutcome::Gated);
        }
        info!("running model '{}'", spec.name);

        let processing = ProcessingManager::new(&spec.processing, self.registry)?;
        let sources = SourcesManager::new(&spec.sources)?;
        let output = OutputManager::new(&spec.output)?;

        let previous = if options.reset && options.dry_run {
            warn!("model '{}': reset is not applied in a dry run", spec.name);
            None
        } else {
            if options.reset {
                output.reset()?;
            }
            output.read_source_versions()?
        };

        let loaded = sources.get_loaded_sources(previous.as_ref())?;
        let mut data = processing.process(&loaded)?;
        data.inject_static_fields(spec.static_fields.iter().map(|f| (f.name.as_str(), &f.value)));
        let rows = data.len();

        let new_versions = sources.get_new_source_versions()?;

        if options.dry_run {
            info!(
                "model '{}': dry run, {} rows and {} watermarks not written",
                spec.name,
                rows,
                new_versions.len()
            );
            return Ok(RunOutcome::DryRun { rows });
        }

        let entry = output.write(data, &new_versions)?;
        info!(
            "model '{}' done: {} rows processed, output holds {} rows",
            spec.name, rows, entry.rows
        );
        Ok(RunOutcome::Completed { rows })
    }
}
