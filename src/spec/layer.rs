//! Layers group the models of one stage; a workflow is every layer, in stage order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::processors::ProcessorRegistry;
use crate::spec::model::{ModelSpec, RawModelSpec};
use crate::spec::{check_name, required};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Landing,
    Intermediate,
    Staging,
    Production,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Landing,
        Stage::Intermediate,
        Stage::Staging,
        Stage::Production,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Intermediate => "intermediate",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "unknown stage '{}', expected one of landing, intermediate, staging, production",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLayerSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub models: Vec<RawModelSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub stage: Stage,
    pub description: Option<String>,
    pub models: Vec<ModelSpec>,
}

impl RawLayerSpec {
    pub fn validate_and_build(&self, repo_root: &Path) -> Result<LayerSpec> {
        let name = required(self.name.clone(), "name", "layer")?;
        check_name("layer", &name)?;
        let owner = format!("layer '{}'", name);
        let stage: Stage = required(self.stage.as_deref(), "stage", &owner)?.parse()?;

        let mut seen = BTreeSet::new();
        let mut models = Vec::with_capacity(self.models.len());
        for raw in &self.models {
            let model = raw
                .validate_and_build(repo_root)
                .map_err(|e| prefix(&owner, e))?;
            if !seen.insert(model.name.clone()) {
                return Err(PipelineError::config(format!(
                    "{}: duplicate model name '{}'",
                    owner, model.name
                )));
            }
            for dep in &model.dependencies {
                if dep.stage_or(stage) > stage {
                    return Err(PipelineError::config(format!(
                        "{}: model '{}' depends on '{}' from a later stage",
                        owner, model.name, dep
                    )));
                }
            }
            models.push(model);
        }

        Ok(LayerSpec {
            name,
            stage,
            description: self.description.clone(),
            models,
        })
    }
}

fn prefix(owner: &str, err: PipelineError) -> PipelineError {
    match err {
        PipelineError::Configuration(msg) => PipelineError::config(format!("{}: {}", owner, msg)),
        other => other,
    }
}

impl LayerSpec {
    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Every layer of a run, keyed and iterated by stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowSpec {
    layers: BTreeMap<Stage, LayerSpec>,
}

impl WorkflowSpec {
    pub fn new(layers: Vec<LayerSpec>) -> Result<Self> {
        let mut by_stage: BTreeMap<Stage, LayerSpec> = BTreeMap::new();
        for layer in layers {
            if let Some(prev) = by_stage.get(&layer.stage) {
                return Err(PipelineError::config(format!(
                    "layers '{}' and '{}' both declare stage '{}'",
                    prev.name, layer.name, layer.stage
                )));
            }
            by_stage.insert(layer.stage, layer);
        }
        Ok(Self { layers: by_stage })
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.values()
    }

    pub fn layer(&self, stage: Stage) -> Option<&LayerSpec> {
        self.layers.get(&stage)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Report every model whose processor is not registered, all at once.
    pub fn check_processors(&self, registry: &ProcessorRegistry) -> Result<()> {
        let unknown: Vec<String> = self
            .layers()
            .flat_map(|layer| layer.models.iter().map(move |m| (layer, m)))
            .filter(|(_, m)| !registry.contains(&m.processing.processor))
            .map(|(layer, m)| format!("{}.{} -> '{}'", layer.stage, m.name, m.processing.processor))
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }
        Err(PipelineError::config(format!(
            "unknown processors: {}",
            unknown.join(", ")
        )))
    }
}
