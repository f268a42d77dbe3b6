use std::fmt;
use std::str::FromStr;

use crate::content::VersionType;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMode {
    /// Only rows strictly above the last recorded cutoff.
    Newest,
    /// Every row, every run.
    All,
}

impl FromStr for VersionMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "newest" => Ok(Self::Newest),
            "all" => Ok(Self::All),
            "" => Err(PipelineError::config("versioning mode must not be empty")),
            other => Err(PipelineError::config(format!(
                "unknown versioning mode '{}', expected 'newest' or 'all'",
                other
            ))),
        }
    }
}

impl fmt::Display for VersionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Newest => f.write_str("newest"),
            Self::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersioningStrategy {
    pub field: String,
    pub mode: VersionMode,
    pub version_type: VersionType,
}

impl VersioningStrategy {
    pub fn new(field: &str, mode: &str, version_type: VersionType) -> Result<Self> {
        if field.trim().is_empty() {
            return Err(PipelineError::config("versioning field must not be empty"));
        }
        Ok(Self {
            field: field.to_string(),
            mode: mode.parse()?,
            version_type,
        })
    }

    pub fn filters(&self) -> bool {
        self.mode == VersionMode::Newest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_checks_field_and_mode() {
        assert!(VersioningStrategy::new("", "newest", VersionType::Datetime).is_err());
        assert!(VersioningStrategy::new("created_at", "", VersionType::Datetime).is_err());
        assert!(VersioningStrategy::new("created_at", "latest", VersionType::Datetime).is_err());

        let s = VersioningStrategy::new("created_at", "all", VersionType::Numeric).unwrap();
        assert_eq!(s.mode, VersionMode::All);
        assert!(!s.filters());
    }
}
