use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::content::VersionType;
use crate::error::Result;
use crate::spec::{check_name, required, resolve_path};
use crate::versioning::VersioningStrategy;

#[derive(Debug, Clone, Deserialize)]
pub struct RawVersioning {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(rename = "type", default)]
    pub version_type: VersionType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSourceSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub versioning: Option<RawVersioning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub path: PathBuf,
    pub versioning: Option<VersioningStrategy>,
}

impl RawSourceSpec {
    pub fn validate_and_build(&self, repo_root: &Path, owner: &str) -> Result<SourceSpec> {
        let name = required(self.name.clone(), "name", &format!("{}: source", owner))?;
        check_name("source", &name)?;
        let owner = format!("{}: source '{}'", owner, name);
        let path = required(self.path.as_deref(), "path", &owner)?;

        let versioning = match &self.versioning {
            None => None,
            Some(v) => Some(VersioningStrategy::new(
                v.field.as_deref().unwrap_or(""),
                v.mode.as_deref().unwrap_or(""),
                v.version_type,
            )?),
        };

        Ok(SourceSpec {
            path: resolve_path(repo_root, path),
            name,
            versioning,
        })
    }
}
