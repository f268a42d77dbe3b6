//! Spec layer: serde-friendly raw shapes plus validated, immutable specs.
//!
//! Every spec comes in two forms:
//! - `Raw*`: what the YAML documents deserialize into (fields optional)
//! - the validated struct built by `validate_and_build`, which callers use

pub mod constraint;
pub mod layer;
pub mod model;
pub mod output;
pub mod processing;
pub mod source;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::{PipelineError, Result};

pub use constraint::{
    AdminConstraintSpec, AdminConstraintSpecs, ConstraintSpec, ConstraintSpecs, EntitySpec,
    EntitySpecs, Keep, MatchRuleSpec, NonNullableSpec, UniqueSpec,
};
pub use layer::{LayerSpec, RawLayerSpec, Stage, WorkflowSpec};
pub use model::{Dependency, ModelSpec, RawModelSpec, StaticField, Trigger};
pub use output::{OutputSpec, RawOutputSpec};
pub use processing::{Params, ProcessingSpec};
pub use source::{RawSourceSpec, SourceSpec};

/// Accept a YAML/JSON scalar (string, number, bool) as text.
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

/// `x` or `[x, ...]` in a document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(x) => vec![x],
            Self::Many(xs) => xs,
        }
    }
}

/// Unwrap a required field or fail with a `Configuration` error naming it.
pub(crate) fn required<T>(value: Option<T>, what: &str, owner: &str) -> Result<T> {
    value.ok_or_else(|| PipelineError::config(format!("{}: missing required field '{}'", owner, what)))
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("name pattern compiles")
});

/// Names of models, sources, outputs and layers: `[A-Za-z0-9_-]+`.
pub(crate) fn check_name(kind: &str, name: &str) -> Result<()> {
    if !NAME_RE.is_match(name) {
        return Err(PipelineError::config(format!(
            "invalid {} name {:?}: only letters, digits, '_' and '-' are allowed",
            kind, name
        )));
    }
    Ok(())
}

/// Resolve a relative spec path against the repository root.
pub(crate) fn resolve_path(repo_root: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_identifiers() {
        assert!(check_name("model", "football_matches-v2").is_ok());
        assert!(check_name("model", "football matches").is_err());
        assert!(check_name("model", "").is_err());
        assert!(check_name("model", "a.b").is_err());
    }

    #[test]
    fn relative_paths_join_repo_root() {
        assert_eq!(
            resolve_path(Path::new("/data"), "landing/x.json"),
            PathBuf::from("/data/landing/x.json")
        );
        assert_eq!(resolve_path(Path::new("/data"), "/abs/x.json"), PathBuf::from("/abs/x.json"));
    }
}
