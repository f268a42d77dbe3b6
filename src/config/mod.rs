//! Loading layer documents (`*.yml` / `*.yaml`) into a validated workflow.

pub mod yaml;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::spec::{LayerSpec, RawLayerSpec, WorkflowSpec};
use crate::workflow::ModelOrder;

pub use yaml::TagResolver;

/// Loads layer documents. Tags like `!date_offset` are resolved against `now`.
#[derive(Debug, Clone, Copy)]
pub struct YamlLoader {
    resolver: TagResolver,
}

impl YamlLoader {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            resolver: TagResolver::new(now),
        }
    }

    /// Loader whose reference time is the local wall clock.
    pub fn now() -> Self {
        Self::new(Local::now().naive_local())
    }

    pub fn parse_layer(&self, text: &str, path: &Path, repo_root: &Path) -> Result<LayerSpec> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text).map_err(PipelineError::yaml(path))?;
        let json = self
            .resolver
            .to_json(&doc)
            .map_err(|e| in_file(path, e))?;
        let raw: RawLayerSpec = serde_json::from_value(json).map_err(PipelineError::json(path))?;
        let layer = raw
            .validate_and_build(repo_root)
            .map_err(|e| in_file(path, e))?;
        ModelOrder::for_layer(&layer).map_err(|e| in_file(path, e))?;
        Ok(layer)
    }

    pub fn load_layer(&self, path: &Path, repo_root: &Path) -> Result<LayerSpec> {
        let text = fs::read_to_string(path).map_err(PipelineError::io(path))?;
        let layer = self.parse_layer(&text, path, repo_root)?;
        debug!(
            "loaded layer '{}' ({} models) from {}",
            layer.name,
            layer.models.len(),
            path.display()
        );
        Ok(layer)
    }

    /// Every layer document in `dir`, in file name order.
    pub fn load_workflow(&self, dir: &Path, repo_root: &Path) -> Result<WorkflowSpec> {
        let files = layer_files(dir)?;
        if files.is_empty() {
            return Err(PipelineError::config(format!(
                "no layer documents (*.yml, *.yaml) in {}",
                dir.display()
            )));
        }
        let layers = files
            .iter()
            .map(|f| self.load_layer(f, repo_root))
            .collect::<Result<Vec<_>>>()?;
        let workflow = WorkflowSpec::new(layers)?;
        info!(
            "loaded {} layers from {}",
            workflow.layers().count(),
            dir.display()
        );
        Ok(workflow)
    }
}

fn layer_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(PipelineError::io(dir))? {
        let path = entry.map_err(PipelineError::io(dir))?.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn in_file(path: &Path, err: PipelineError) -> PipelineError {
    match err {
        PipelineError::Configuration(msg) => {
            PipelineError::config(format!("{}: {}", path.display(), msg))
        }
        other => other,
    }
}
