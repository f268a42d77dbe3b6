use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::content::{Content, VersionValue};
use crate::error::{PipelineError, Result};
use crate::spec::{Keep, UniqueSpec};

/// Deduplicates rows per field set, breaking ties with the version column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueEnforcer {
    spec: UniqueSpec,
}

impl UniqueEnforcer {
    pub fn new(spec: UniqueSpec) -> Self {
        Self { spec }
    }

    pub fn apply(&self, content: Content) -> Result<Content> {
        if content.is_empty() {
            return Ok(content);
        }
        let missing: Vec<&str> = self
            .spec
            .required_fields()
            .into_iter()
            .filter(|f| !content.has_field(f))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::validation(format!(
                "unique constraint needs fields missing from the data: {}",
                missing.join(", ")
            )));
        }

        let mut content = content;
        for field_set in &self.spec.field_sets {
            let before = content.len();
            let order = self.sorted_order(&content)?;
            let keep = dedup(&content, &order, field_set, self.spec.keep);
            content = content.select(&keep);
            debug!(
                "unique on [{}]: {} -> {} rows",
                field_set.join(", "),
                before,
                content.len()
            );
        }
        Ok(content)
    }

    /// Row indices stably sorted ascending by version, null versions last.
    fn sorted_order(&self, content: &Content) -> Result<Vec<usize>> {
        let col = &self.spec.version_col;
        let versions = (0..content.len())
            .map(|row| match content.text(row, col) {
                None => Ok(None),
                Some(raw) => self.spec.version_type.parse_field(col, &raw).map(Some),
            })
            .collect::<Result<Vec<Option<VersionValue>>>>()?;

        let mut order: Vec<usize> = (0..content.len()).collect();
        order.sort_by(|&a, &b| match (&versions[a], &versions[b]) {
            (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(order)
    }
}

/// Indices from `order` that survive deduplication on `fields`, in sorted order.
fn dedup(content: &Content, order: &[usize], fields: &[String], keep: Keep) -> Vec<usize> {
    let key = |row: usize| -> Vec<Option<String>> {
        fields
            .iter()
            .map(|f| content.text(row, f).map(|t| t.into_owned()))
            .collect()
    };

    let mut chosen: HashMap<Vec<Option<String>>, usize> = HashMap::new();
    for (pos, &row) in order.iter().enumerate() {
        match keep {
            Keep::First => {
                chosen.entry(key(row)).or_insert(pos);
            }
            Keep::Last => {
                chosen.insert(key(row), pos);
            }
        }
    }

    let mut positions: Vec<usize> = chosen.into_values().collect();
    positions.sort_unstable();
    positions.into_iter().map(|pos| order[pos]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Table, VersionType};
    use pretty_assertions::assert_eq;

    fn table(rows: &[[&str; 3]]) -> Content {
        Content::Table(
            Table::from_rows(
                ["id", "created_at", "score"],
                rows.iter()
                    .map(|r| r.iter().map(|c| (!c.is_empty()).then(|| c.to_string())).collect())
                    .collect(),
            )
            .unwrap(),
        )
    }

    fn spec(keep: Keep) -> UniqueSpec {
        UniqueSpec {
            field_sets: vec![vec!["id".into()]],
            version_col: "created_at".into(),
            version_type: VersionType::Datetime,
            keep,
        }
    }

    #[test]
    fn keep_last_picks_the_newest() {
        let input = table(&[
            ["1", "2023-01-02", "b"],
            ["2", "2023-01-01", "x"],
            ["1", "2023-01-01", "a"],
        ]);
        let out = UniqueEnforcer::new(spec(Keep::Last)).apply(input).unwrap();
        assert_eq!(out, table(&[["2", "2023-01-01", "x"], ["1", "2023-01-02", "b"]]));
    }

    #[test]
    fn keep_first_picks_the_oldest() {
        let input = table(&[["1", "2023-01-02", "b"], ["1", "2023-01-01", "a"]]);
        let out = UniqueEnforcer::new(spec(Keep::First)).apply(input).unwrap();
        assert_eq!(out, table(&[["1", "2023-01-01", "a"]]));
    }

    #[test]
    fn null_versions_sort_last() {
        let input = table(&[["1", "", "null"], ["1", "2023-01-01", "a"]]);
        let out = UniqueEnforcer::new(spec(Keep::Last)).apply(input).unwrap();
        assert_eq!(out, table(&[["1", "", "null"]]));
    }

    #[test]
    fn is_idempotent() {
        let input = table(&[
            ["1", "2023-01-03", "c"],
            ["2", "2023-01-01", "x"],
            ["1", "2023-01-01", "a"],
            ["2", "2023-01-05", "y"],
        ]);
        let enforcer = UniqueEnforcer::new(spec(Keep::Last));
        let once = enforcer.apply(input).unwrap();
        let twice = enforcer.apply(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn numeric_versions_keep_last() {
        let versioned = |rows: &[[&str; 2]]| {
            Content::Table(
                Table::from_rows(
                    ["id", "version"],
                    rows.iter()
                        .map(|r| r.iter().map(|c| Some(c.to_string())).collect())
                        .collect(),
                )
                .unwrap(),
            )
        };
        let spec = UniqueSpec {
            field_sets: vec![vec!["id".into()]],
            version_col: "version".into(),
            version_type: VersionType::Numeric,
            keep: Keep::Last,
        };
        let out = UniqueEnforcer::new(spec)
            .apply(versioned(&[["1", "1"], ["1", "2"]]))
            .unwrap();
        assert_eq!(out, versioned(&[["1", "2"]]));
    }

    #[test]
    fn unparseable_version_fails() {
        let input = table(&[["1", "soon", "a"]]);
        let err = UniqueEnforcer::new(spec(Keep::Last)).apply(input).unwrap_err();
        assert!(matches!(err, PipelineError::DataValidation(_)));
    }

    #[test]
    fn missing_field_fails() {
        let mut s = spec(Keep::Last);
        s.field_sets = vec![vec!["match_id".into()]];
        let err = UniqueEnforcer::new(s)
            .apply(table(&[["1", "2023-01-01", "a"]]))
            .unwrap_err();
        assert!(err.to_string().contains("match_id"));
    }
}
