//! Admin overrides on entity-match tables.
//!
//! A match table links `(source_A, id_A)` to `(source_B, id_B)` with a
//! `similarity_score`. Force rules pin links between listed entities; block
//! rules remove them.

use tracing::debug;

use crate::content::{Content, Table};
use crate::error::{PipelineError, Result};
use crate::spec::MatchRuleSpec;

pub const MATCH_COLUMNS: [&str; 5] = ["id_A", "id_B", "source_A", "source_B", "similarity_score"];
pub const FORCED_SCORE: &str = "100";

fn match_table(content: Content, rule: &str) -> Result<Table> {
    let table = content.expect_table(rule)?;
    let missing = table.missing_columns(MATCH_COLUMNS);
    if !missing.is_empty() {
        return Err(PipelineError::validation(format!(
            "{} needs match columns missing from the data: {}",
            rule,
            missing.join(", ")
        )));
    }
    Ok(table)
}

fn side<'a>(table: &'a Table, row: usize, suffix: &str) -> (&'a str, &'a str) {
    let source = table.get(row, &format!("source_{}", suffix)).unwrap_or("");
    let id = table.get(row, &format!("id_{}", suffix)).unwrap_or("");
    (source, id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceMatchEnforcer {
    rule: MatchRuleSpec,
}

impl ForceMatchEnforcer {
    pub fn new(rule: MatchRuleSpec) -> Self {
        Self { rule }
    }

    /// Replace every link touching a listed entity with one forced link per ordered pair.
    pub fn apply(&self, content: Content) -> Result<Content> {
        let mut table = match_table(content, "force_match")?;
        let entities = &self.rule.entities;

        let before = table.len();
        let touching: Vec<bool> = (0..table.len())
            .map(|row| {
                let (sa, ia) = side(&table, row, "A");
                let (sb, ib) = side(&table, row, "B");
                entities.contains(sa, ia) || entities.contains(sb, ib)
            })
            .collect();
        table.retain_rows(|row, _| !touching[row]);
        let purged = before - table.len();

        let pairs = entities.all_pairs();
        for (a, b) in &pairs {
            table.push_named([
                ("source_A", Some(a.source.clone())),
                ("id_A", Some(a.source_id.clone())),
                ("source_B", Some(b.source.clone())),
                ("id_B", Some(b.source_id.clone())),
                ("similarity_score", Some(FORCED_SCORE.to_string())),
            ])?;
        }

        debug!(
            "force_match '{}': purged {} rows, added {}",
            self.rule.entity_type,
            purged,
            pairs.len()
        );
        Ok(Content::Table(table))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMatchEnforcer {
    rule: MatchRuleSpec,
}

impl BlockMatchEnforcer {
    pub fn new(rule: MatchRuleSpec) -> Self {
        Self { rule }
    }

    /// Remove links between every ordered pair of listed entities; other rows stay.
    pub fn apply(&self, content: Content) -> Result<Content> {
        let mut table = match_table(content, "block_match")?;
        let pairs = self.rule.entities.all_pairs();

        let before = table.len();
        let blocked: Vec<bool> = (0..table.len())
            .map(|row| {
                let (sa, ia) = side(&table, row, "A");
                let (sb, ib) = side(&table, row, "B");
                pairs.iter().any(|(a, b)| {
                    a.source == sa && a.source_id == ia && b.source == sb && b.source_id == ib
                })
            })
            .collect();
        table.retain_rows(|row, _| !blocked[row]);

        debug!(
            "block_match '{}': removed {} rows",
            self.rule.entity_type,
            before - table.len()
        );
        Ok(Content::Table(table))
    }
}
