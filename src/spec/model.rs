use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::spec::layer::Stage;
use crate::spec::output::{OutputSpec, RawOutputSpec};
use crate::spec::processing::{ProcessingSpec, RawProcessingSpec};
use crate::spec::source::{RawSourceSpec, SourceSpec};
use crate::spec::{check_name, required};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Automatic,
    /// Only runs when the caller asks for manual models.
    Manual,
}

impl FromStr for Trigger {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "automatic" => Ok(Self::Automatic),
            "manual" => Ok(Self::Manual),
            other => Err(PipelineError::config(format!(
                "unknown trigger '{}', expected 'automatic' or 'manual'",
                other
            ))),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Automatic => f.write_str("automatic"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStaticField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// Constant column added to every processed row.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticField {
    pub name: String,
    pub value: Value,
}

/// `"<stage>.<model>"`, or a bare `"<model>"` meaning the model's own stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Dependency {
    pub stage: Option<Stage>,
    pub model: String,
}

impl Dependency {
    pub fn parse(raw: &str) -> Result<Self> {
        let (stage, model) = match raw.split_once('.') {
            Some((stage, model)) => (Some(stage.parse::<Stage>()?), model),
            None => (None, raw),
        };
        check_name("dependency", model)?;
        Ok(Self {
            stage,
            model: model.to_string(),
        })
    }

    pub fn stage_or(&self, own: Stage) -> Stage {
        self.stage.unwrap_or(own)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{}.{}", stage, self.model),
            None => f.write_str(&self.model),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawModelSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sources: Vec<RawSourceSpec>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub output: Option<RawOutputSpec>,
    #[serde(default)]
    pub processing: Option<RawProcessingSpec>,
    #[serde(default)]
    pub static_fields: Vec<RawStaticField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    pub trigger: Trigger,
    pub description: Option<String>,
    pub sources: Vec<SourceSpec>,
    pub dependencies: Vec<Dependency>,
    pub output: OutputSpec,
    pub processing: ProcessingSpec,
    pub static_fields: Vec<StaticField>,
}

impl RawModelSpec {
    /// Validate a raw model and resolve its paths against `repo_root`:
    /// - name, trigger, output and processing are present
    /// - names are identifiers and source names are unique
    /// - dependencies parse as `[stage.]model`
    pub fn validate_and_build(&self, repo_root: &Path) -> Result<ModelSpec> {
        let name = required(self.name.clone(), "name", "model")?;
        check_name("model", &name)?;
        let owner = format!("model '{}'", name);

        let trigger: Trigger = required(self.trigger.as_deref(), "trigger", &owner)?.parse()?;
        let output = required(self.output.as_ref(), "output", &owner)?
            .validate_and_build(repo_root, &owner)?;
        let processing = required(self.processing.as_ref(), "processing", &owner)?
            .validate_and_build(&owner)?;

        let mut seen = BTreeSet::new();
        let mut sources = Vec::with_capacity(self.sources.len());
        for raw in &self.sources {
            let source = raw.validate_and_build(repo_root, &owner)?;
            if !seen.insert(source.name.clone()) {
                return Err(PipelineError::config(format!(
                    "{}: duplicate source name '{}'",
                    owner, source.name
                )));
            }
            sources.push(source);
        }

        let dependencies = self
            .dependencies
            .iter()
            .map(|d| Dependency::parse(d))
            .collect::<Result<Vec<_>>>()?;

        let mut static_fields = Vec::with_capacity(self.static_fields.len());
        for raw in &self.static_fields {
            let field_name = required(raw.name.clone(), "name", &format!("{}: static field", owner))?;
            if raw.value.is_array() || raw.value.is_object() {
                return Err(PipelineError::config(format!(
                    "{}: static field '{}' must be a scalar",
                    owner, field_name
                )));
            }
            static_fields.push(StaticField {
                name: field_name,
                value: raw.value.clone(),
            });
        }

        Ok(ModelSpec {
            name,
            trigger,
            description: self.description.clone(),
            sources,
            dependencies,
            output,
            processing,
            static_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(v: Value) -> RawModelSpec {
        serde_json::from_value(v).unwrap()
    }

    fn minimal() -> Value {
        json!({
            "name": "football_matches",
            "trigger": "automatic",
            "sources": [{"name": "espn", "path": "landing/espn.json"}],
            "dependencies": ["landing.espn_matches", "teams"],
            "output": {"name": "football_matches", "path": "intermediate/m.csv", "layer": "intermediate"},
            "processing": {"processor": "select_source", "source": "espn"},
            "static_fields": [{"name": "sport", "value": "football"}]
        })
    }

    #[test]
    fn builds_minimal_model() {
        let spec = raw(minimal()).validate_and_build(Path::new("/repo")).unwrap();
        assert_eq!(spec.trigger, Trigger::Automatic);
        assert_eq!(
            spec.dependencies,
            vec![
                Dependency {
                    stage: Some(Stage::Landing),
                    model: "espn_matches".into()
                },
                Dependency {
                    stage: None,
                    model: "teams".into()
                },
            ]
        );
        assert_eq!(spec.static_fields[0].value, json!("football"));
    }

    #[test]
    fn fails_fast_on_missing_fields() {
        for key in ["name", "trigger", "output", "processing"] {
            let mut v = minimal();
            v.as_object_mut().unwrap().remove(key);
            let err = raw(v).validate_and_build(Path::new("/repo")).unwrap_err();
            assert!(
                matches!(err, PipelineError::Configuration(ref m) if m.contains(key)),
                "{}: {}",
                key,
                err
            );
        }
    }

    #[test]
    fn rejects_unknown_trigger_and_duplicate_sources() {
        let mut v = minimal();
        v["trigger"] = json!("hourly");
        assert!(raw(v).validate_and_build(Path::new("/r")).is_err());

        let mut v = minimal();
        v["sources"] = json!([
            {"name": "espn", "path": "a.json"},
            {"name": "espn", "path": "b.json"}
        ]);
        assert!(raw(v).validate_and_build(Path::new("/r")).is_err());
    }

    #[test]
    fn dependency_stage_must_be_known() {
        assert!(Dependency::parse("bronze.x").is_err());
        assert_eq!(Dependency::parse("staging.x").unwrap().to_string(), "staging.x");
    }
}
