use tracing::debug;

use crate::content::Content;
use crate::error::{PipelineError, Result};
use crate::spec::NonNullableSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonNullableEnforcer {
    spec: NonNullableSpec,
}

impl NonNullableEnforcer {
    pub fn new(spec: NonNullableSpec) -> Self {
        Self { spec }
    }

    /// Drop rows holding a null in any listed field.
    pub fn apply(&self, content: Content) -> Result<Content> {
        if let Content::Table(table) = &content {
            let missing = table.missing_columns(self.spec.fields.iter().map(String::as_str));
            if !missing.is_empty() {
                return Err(PipelineError::validation(format!(
                    "non-nullable constraint names columns missing from the data: {}",
                    missing.join(", ")
                )));
            }
        }

        let keep: Vec<usize> = (0..content.len())
            .filter(|&row| self.spec.fields.iter().all(|f| content.text(row, f).is_some()))
            .collect();
        if keep.len() == content.len() {
            return Ok(content);
        }
        debug!(
            "non-nullable on [{}]: dropped {} rows",
            self.spec.fields.join(", "),
            content.len() - keep.len()
        );
        Ok(content.select(&keep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Table;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec(fields: &[&str]) -> NonNullableSpec {
        NonNullableSpec {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn drops_rows_with_null_markers() {
        let t = Table::from_rows(
            ["id", "home"],
            vec![
                vec![Some("1".into()), Some("A".into())],
                vec![Some("2".into()), Some("nan".into())],
                vec![Some("3".into()), None],
                vec![Some("None".into()), Some("B".into())],
            ],
        )
        .unwrap();
        let out = NonNullableEnforcer::new(spec(&["id", "home"]))
            .apply(Content::Table(t))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.text(0, "id").as_deref(), Some("1"));
    }

    #[test]
    fn missing_table_column_fails() {
        let t = Table::new(["id"]);
        let err = NonNullableEnforcer::new(spec(&["home"]))
            .apply(Content::Table(t))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataValidation(_)));
    }

    #[test]
    fn absent_record_keys_count_as_null() {
        let Ok(Content::Records(out)) = NonNullableEnforcer::new(spec(&["home"])).apply(Content::Records(vec![
            json!({"home": "A"}).as_object().cloned().unwrap(),
            json!({"away": "B"}).as_object().cloned().unwrap(),
        ])) else {
            panic!("expected records");
        };
        assert_eq!(out.len(), 1);
    }
}
