use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Last consumed watermark of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVersion {
    version_field: String,
    version_cutoff: String,
}

impl SourceVersion {
    pub fn new(version_field: impl Into<String>, version_cutoff: impl Into<String>) -> Result<Self> {
        let version_field = version_field.into();
        let version_cutoff = version_cutoff.into();
        if version_field.trim().is_empty() {
            return Err(PipelineError::validation("source version field must not be empty"));
        }
        if version_cutoff.trim().is_empty() {
            return Err(PipelineError::validation(format!(
                "cutoff for source version field '{}' must not be empty",
                version_field
            )));
        }
        Ok(Self {
            version_field,
            version_cutoff,
        })
    }

    pub fn version_field(&self) -> &str {
        &self.version_field
    }

    pub fn version_cutoff(&self) -> &str {
        &self.version_cutoff
    }
}

/// Journal form of a [`SourceVersion`]. Either half may be missing in old files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedVersion {
    #[serde(default)]
    pub version_field: Option<String>,
    #[serde(default)]
    pub version_cutoff: Option<String>,
}

/// Source name -> watermark. Append-only: a name can be inserted once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceVersions {
    inner: BTreeMap<String, SourceVersion>,
}

impl SourceVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, version: SourceVersion) -> Result<()> {
        let name = name.into();
        if self.inner.contains_key(&name) {
            return Err(PipelineError::DuplicateKey(name));
        }
        self.inner.insert(name, version);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SourceVersion> {
        self.inner.get(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceVersion)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Rebuild from journal data, skipping entries without a field or cutoff.
    pub fn from_recorded(recorded: &BTreeMap<String, RecordedVersion>) -> Self {
        let mut inner = BTreeMap::new();
        for (name, rec) in recorded {
            let (Some(field), Some(cutoff)) = (&rec.version_field, &rec.version_cutoff) else {
                debug!("skipping recorded version of '{}': field or cutoff missing", name);
                continue;
            };
            match SourceVersion::new(field.as_str(), cutoff.as_str()) {
                Ok(v) => {
                    inner.insert(name.clone(), v);
                }
                Err(e) => debug!("skipping recorded version of '{}': {}", name, e),
            }
        }
        Self { inner }
    }

    pub fn to_recorded(&self) -> BTreeMap<String, RecordedVersion> {
        self.inner
            .iter()
            .map(|(name, v)| {
                (
                    name.clone(),
                    RecordedVersion {
                        version_field: Some(v.version_field.clone()),
                        version_cutoff: Some(v.version_cutoff.clone()),
                    },
                )
            })
            .collect()
    }
}
