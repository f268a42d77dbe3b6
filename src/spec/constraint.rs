//! Data-quality rules attached to an output.
//!
//! Regular constraints (`unique`, `non-nullable`) and admin match rules
//! (`force_match`, `block_match`) live in separate collections so the two
//! can never be mixed up.

use serde::Deserialize;

use crate::content::VersionType;
use crate::error::{PipelineError, Result};
use crate::spec::scalar_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    First,
    #[default]
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UniqueSpec {
    pub field_sets: Vec<Vec<String>>,
    pub version_col: String,
    #[serde(default)]
    pub version_type: VersionType,
    #[serde(default)]
    pub keep: Keep,
}

impl UniqueSpec {
    fn validate(&self) -> Result<()> {
        if self.version_col.trim().is_empty() {
            return Err(PipelineError::config("unique constraint needs a version_col"));
        }
        if self.field_sets.is_empty() || self.field_sets.iter().any(Vec::is_empty) {
            return Err(PipelineError::config(
                "unique constraint needs at least one non-empty field set",
            ));
        }
        Ok(())
    }

    /// Version column followed by every field-set field, first occurrence order.
    pub fn required_fields(&self) -> Vec<&str> {
        let mut out = vec![self.version_col.as_str()];
        for field in self.field_sets.iter().flatten() {
            if !out.contains(&field.as_str()) {
                out.push(field);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NonNullableSpec {
    pub fields: Vec<String>,
}

impl NonNullableSpec {
    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(PipelineError::config("non-nullable constraint needs at least one field"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConstraintSpec {
    Unique(UniqueSpec),
    #[serde(alias = "non_nullable")]
    NonNullable(NonNullableSpec),
}

impl ConstraintSpec {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Unique(u) => u.validate(),
            Self::NonNullable(n) => n.validate(),
        }
    }
}

/// Regular constraints in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSpecs(Vec<ConstraintSpec>);

impl ConstraintSpecs {
    pub fn new(specs: Vec<ConstraintSpec>) -> Result<Self> {
        for spec in &specs {
            spec.validate()?;
        }
        Ok(Self(specs))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConstraintSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntitySpec {
    pub source: String,
    #[serde(deserialize_with = "scalar_string")]
    pub source_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct EntitySpecs(Vec<EntitySpec>);

impl EntitySpecs {
    pub fn new(entities: Vec<EntitySpec>) -> Self {
        Self(entities)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntitySpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, source: &str, source_id: &str) -> bool {
        self.0
            .iter()
            .any(|e| e.source == source && e.source_id == source_id)
    }

    /// Every ordered pair of distinct positions: n entities give n * (n - 1) pairs.
    pub fn all_pairs(&self) -> Vec<(&EntitySpec, &EntitySpec)> {
        let mut out = Vec::new();
        for (i, a) in self.0.iter().enumerate() {
            for (j, b) in self.0.iter().enumerate() {
                if i != j {
                    out.push((a, b));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatchRuleSpec {
    pub entity_type: String,
    pub entities: EntitySpecs,
}

impl MatchRuleSpec {
    fn validate(&self, kind: &str) -> Result<()> {
        if self.entity_type.trim().is_empty() {
            return Err(PipelineError::config(format!("{} rule needs an entity_type", kind)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminConstraintSpec {
    ForceMatch(MatchRuleSpec),
    BlockMatch(MatchRuleSpec),
}

impl AdminConstraintSpec {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::ForceMatch(r) => r.validate("force_match"),
            Self::BlockMatch(r) => r.validate("block_match"),
        }
    }
}

/// Admin match rules, applied after every regular constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminConstraintSpecs(Vec<AdminConstraintSpec>);

impl AdminConstraintSpecs {
    pub fn new(specs: Vec<AdminConstraintSpec>) -> Result<Self> {
        for spec in &specs {
            spec.validate()?;
        }
        Ok(Self(specs))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AdminConstraintSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
