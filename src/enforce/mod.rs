//! Constraint enforcers applied to output content before it is written.

pub mod admin;
pub mod non_null;
pub mod unique;

use tracing::debug;

use crate::content::Content;
use crate::error::Result;
use crate::spec::{AdminConstraintSpec, ConstraintSpec, OutputSpec};

pub use admin::{BlockMatchEnforcer, ForceMatchEnforcer};
pub use non_null::NonNullableEnforcer;
pub use unique::UniqueEnforcer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintEnforcer {
    Unique(UniqueEnforcer),
    NonNullable(NonNullableEnforcer),
    ForceMatch(ForceMatchEnforcer),
    BlockMatch(BlockMatchEnforcer),
}

impl ConstraintEnforcer {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unique(_) => "unique",
            Self::NonNullable(_) => "non-nullable",
            Self::ForceMatch(_) => "force_match",
            Self::BlockMatch(_) => "block_match",
        }
    }

    pub fn apply(&self, content: Content) -> Result<Content> {
        match self {
            Self::Unique(e) => e.apply(content),
            Self::NonNullable(e) => e.apply(content),
            Self::ForceMatch(e) => e.apply(content),
            Self::BlockMatch(e) => e.apply(content),
        }
    }
}

impl From<&ConstraintSpec> for ConstraintEnforcer {
    fn from(spec: &ConstraintSpec) -> Self {
        match spec {
            ConstraintSpec::Unique(u) => Self::Unique(UniqueEnforcer::new(u.clone())),
            ConstraintSpec::NonNullable(n) => Self::NonNullable(NonNullableEnforcer::new(n.clone())),
        }
    }
}

impl From<&AdminConstraintSpec> for ConstraintEnforcer {
    fn from(spec: &AdminConstraintSpec) -> Self {
        match spec {
            AdminConstraintSpec::ForceMatch(r) => Self::ForceMatch(ForceMatchEnforcer::new(r.clone())),
            AdminConstraintSpec::BlockMatch(r) => Self::BlockMatch(BlockMatchEnforcer::new(r.clone())),
        }
    }
}

/// Enforcers for an output: regular constraints in declared order, then admin rules.
pub fn build_enforcers(output: &OutputSpec) -> Vec<ConstraintEnforcer> {
    output
        .constraints
        .iter()
        .map(ConstraintEnforcer::from)
        .chain(output.admin_rules.iter().map(ConstraintEnforcer::from))
        .collect()
}

/// Run every enforcer in order over `content`.
pub fn enforce_all(enforcers: &[ConstraintEnforcer], content: Content) -> Result<Content> {
    enforcers.iter().try_fold(content, |content, enforcer| {
        let before = content.len();
        let out = enforcer.apply(content)?;
        debug!("{}: {} -> {} rows", enforcer.name(), before, out.len());
        Ok(out)
    })
}
