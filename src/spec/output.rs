use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::spec::constraint::{
    AdminConstraintSpec, AdminConstraintSpecs, ConstraintSpec, ConstraintSpecs, MatchRuleSpec,
    NonNullableSpec, UniqueSpec,
};
use crate::spec::{OneOrMany, check_name, required, resolve_path};

/// Output block as written in a layer document.
///
/// Constraints may be given under the `unique` / `non-nullable` keys, as a
/// tagged `constraints:` list, or both. Admin rules take one rule or a list.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOutputSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub unique: Option<UniqueSpec>,
    #[serde(default, rename = "non-nullable", alias = "non_nullable")]
    pub non_nullable: Option<NonNullableSpec>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    #[serde(default)]
    pub force_match: Option<OneOrMany<MatchRuleSpec>>,
    #[serde(default)]
    pub block_match: Option<OneOrMany<MatchRuleSpec>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub name: String,
    pub path: PathBuf,
    pub layer: String,
    pub schema: Option<String>,
    pub constraints: ConstraintSpecs,
    pub admin_rules: AdminConstraintSpecs,
}

impl RawOutputSpec {
    pub fn validate_and_build(&self, repo_root: &Path, owner: &str) -> Result<OutputSpec> {
        let owner = format!("{}: output", owner);
        let name = required(self.name.clone(), "name", &owner)?;
        check_name("output", &name)?;
        let path = required(self.path.as_deref(), "path", &owner)?;
        let layer = required(self.layer.clone(), "layer", &owner)?;

        let mut constraints = Vec::new();
        if let Some(u) = &self.unique {
            constraints.push(ConstraintSpec::Unique(u.clone()));
        }
        if let Some(n) = &self.non_nullable {
            constraints.push(ConstraintSpec::NonNullable(n.clone()));
        }
        constraints.extend(self.constraints.iter().cloned());

        let mut admin = Vec::new();
        if let Some(rules) = &self.force_match {
            admin.extend(rules.clone().into_vec().into_iter().map(AdminConstraintSpec::ForceMatch));
        }
        if let Some(rules) = &self.block_match {
            admin.extend(rules.clone().into_vec().into_iter().map(AdminConstraintSpec::BlockMatch));
        }

        Ok(OutputSpec {
            path: resolve_path(repo_root, path),
            name,
            layer,
            schema: self.schema.clone(),
            constraints: ConstraintSpecs::new(constraints)?,
            admin_rules: AdminConstraintSpecs::new(admin)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_constraints_come_before_the_list() {
        let raw: RawOutputSpec = serde_json::from_value(json!({
            "name": "matches",
            "path": "intermediate/matches.csv",
            "layer": "intermediate",
            "constraints": [{"type": "non-nullable", "fields": ["home"]}],
            "non-nullable": {"fields": ["id"]},
            "unique": {"field_sets": [["id"]], "version_col": "created_at"},
            "force_match": {"entity_type": "team", "entities": [
                {"source": "espn", "source_id": 1}, {"source": "fd", "source_id": "a"}
            ]},
            "block_match": [{"entity_type": "team", "entities": [
                {"source": "espn", "source_id": 2}, {"source": "fd", "source_id": "b"}
            ]}]
        }))
        .unwrap();
        let out = raw.validate_and_build(Path::new("/r"), "model 'm'").unwrap();

        let kinds: Vec<&str> = out
            .constraints
            .iter()
            .map(|c| match c {
                ConstraintSpec::Unique(_) => "unique",
                ConstraintSpec::NonNullable(n) => n.fields[0].as_str(),
            })
            .collect();
        assert_eq!(kinds, vec!["unique", "id", "home"]);
        assert_eq!(out.admin_rules.len(), 2);
        assert!(matches!(out.admin_rules.iter().next(), Some(AdminConstraintSpec::ForceMatch(_))));
    }

    #[test]
    fn layer_is_required() {
        let raw: RawOutputSpec =
            serde_json::from_value(json!({"name": "m", "path": "m.csv"})).unwrap();
        let err = raw.validate_and_build(Path::new("/r"), "model 'm'").unwrap_err();
        assert!(err.to_string().contains("layer"));
    }
}
