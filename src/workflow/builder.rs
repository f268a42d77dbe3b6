use std::collections::BTreeSet;

use tracing::{error, info, warn};

use crate::error::Result;
use crate::managers::{ModelManager, RunOptions, RunOutcome};
use crate::processors::ProcessorRegistry;
use crate::spec::{LayerSpec, ModelSpec, Stage, WorkflowSpec};
use crate::workflow::ModelOrder;

/// What happened to each model of a layer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerReport {
    pub completed: Vec<String>,
    pub gated: Vec<String>,
    pub dry_run: Vec<String>,
    /// (model, error message)
    pub failed: Vec<(String, String)>,
    /// Not run because a dependency failed or was skipped.
    pub skipped: Vec<String>,
}

impl LayerReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    fn unavailable(&self) -> impl Iterator<Item = &str> {
        self.failed
            .iter()
            .map(|(m, _)| m.as_str())
            .chain(self.skipped.iter().map(String::as_str))
    }
}

/// Runs the models of one layer in dependency order, isolating failures per model.
pub struct LayerBuilder<'r> {
    layer: &'r LayerSpec,
    order: ModelOrder,
    registry: &'r ProcessorRegistry,
}

impl<'r> LayerBuilder<'r> {
    pub fn new(layer: &'r LayerSpec, registry: &'r ProcessorRegistry) -> Result<Self> {
        Ok(Self {
            layer,
            order: ModelOrder::for_layer(layer)?,
            registry,
        })
    }

    /// Run every model (or only `selected` ones when non-empty).
    ///
    /// `unavailable` holds `(stage, model)` pairs from earlier layers that failed or
    /// were skipped; models depending on them are skipped too.
    pub fn build(
        &self,
        options: RunOptions,
        selected: &BTreeSet<String>,
        unavailable: &BTreeSet<(Stage, String)>,
    ) -> LayerReport {
        let stage = self.layer.stage;
        let mut report = LayerReport::default();
        info!("building layer '{}' ({})", self.layer.name, stage);

        for &idx in self.order.indices() {
            let model = &self.layer.models[idx];
            if !selected.is_empty() && !selected.contains(&model.name) {
                continue;
            }

            if let Some(dep) = self.blocked_by(model, &report, unavailable) {
                warn!("skipping model '{}': dependency '{}' did not complete", model.name, dep);
                report.skipped.push(model.name.clone());
                continue;
            }

            match ModelManager::new(model, self.registry).run(options) {
                Ok(RunOutcome::Completed { .. }) => report.completed.push(model.name.clone()),
                Ok(RunOutcome::DryRun { .. }) => report.dry_run.push(model.name.clone()),
                Ok(RunOutcome::Gated) => report.gated.push(model.name.clone()),
                Err(e) => {
                    error!("model '{}' failed: {}", model.name, e);
                    report.failed.push((model.name.clone(), e.to_string()));
                }
            }
        }

        info!(
            "layer '{}': {} completed, {} dry run, {} gated, {} failed, {} skipped",
            self.layer.name,
            report.completed.len(),
            report.dry_run.len(),
            report.gated.len(),
            report.failed.len(),
            report.skipped.len()
        );
        report
    }

    fn blocked_by(
        &self,
        model: &ModelSpec,
        report: &LayerReport,
        unavailable: &BTreeSet<(Stage, String)>,
    ) -> Option<String> {
        let stage = self.layer.stage;
        if let Some(dep) = self
            .order
            .parents(&model.name)
            .iter()
            .find(|d| report.unavailable().any(|u| u == d.as_str()))
        {
            return Some(dep.clone());
        }
        model
            .dependencies
            .iter()
            .find(|d| unavailable.contains(&(d.stage_or(stage), d.model.clone())))
            .map(|d| d.to_string())
    }
}

/// Run the layers of `workflow` in stage order, optionally limited to one stage.
pub fn run_workflow(
    workflow: &WorkflowSpec,
    registry: &ProcessorRegistry,
    options: RunOptions,
    stage: Option<Stage>,
    selected: &BTreeSet<String>,
) -> Result<Vec<(Stage, LayerReport)>> {
    let mut unavailable = BTreeSet::new();
    let mut reports = Vec::new();
    for layer in workflow.layers() {
        if stage.is_some_and(|s| s != layer.stage) {
            continue;
        }
        let report = LayerBuilder::new(layer, registry)?.build(options, selected, &unavailable);
        unavailable.extend(report.unavailable().map(|m| (layer.stage, m.to_string())));
        reports.push((layer.stage, report));
    }
    Ok(reports)
}
