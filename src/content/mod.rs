//! In-memory content exchanged between stores, processors and enforcers.
//!
//! Two shapes exist and never mix:
//! - `Content::Table`: a header plus text cells (CSV files)
//! - `Content::Records`: a list of JSON objects (JSON files)

pub mod table;
pub mod value;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{PipelineError, Result};

pub use table::{Row, Table};
pub use value::{VersionType, VersionValue, parse_datetime};

pub type Record = Map<String, Value>;

/// Textual markers treated as null, in addition to absent values and JSON `null`.
pub const NULL_MARKERS: &[&str] = &["", "nan", "None"];

pub fn is_null(text: &str) -> bool {
    NULL_MARKERS.contains(&text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Table,
    Records,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => f.write_str("table"),
            Self::Records => f.write_str("records"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Table(Table),
    Records(Vec<Record>),
}

impl Content {
    pub fn empty(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Table => Self::Table(Table::default()),
            ContentKind::Records => Self::Records(Vec::new()),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Table(_) => ContentKind::Table,
            Self::Records(_) => ContentKind::Records,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Table(t) => t.len(),
            Self::Records(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            Self::Records(_) => None,
        }
    }

    /// Fail with `DataValidation` unless this is a table; `what` names the caller.
    pub fn expect_table(self, what: &str) -> Result<Table> {
        match self {
            Self::Table(t) => Ok(t),
            Self::Records(_) => Err(PipelineError::validation(format!(
                "{} requires tabular content, got records",
                what
            ))),
        }
    }

    pub fn concat(self, other: Content) -> Result<Content> {
        match (self, other) {
            (Self::Table(mut left), Self::Table(right)) => {
                left.append(right);
                Ok(Self::Table(left))
            }
            (Self::Records(mut left), Self::Records(right)) => {
                left.extend(right);
                Ok(Self::Records(left))
            }
            (left, right) => Err(PipelineError::validation(format!(
                "cannot concatenate {} content with {} content",
                left.kind(),
                right.kind()
            ))),
        }
    }

    /// Text of `field` at `row`, `None` when the value is null.
    pub fn text(&self, row: usize, field: &str) -> Option<Cow<'_, str>> {
        let raw = match self {
            Self::Table(t) => Cow::Borrowed(t.get(row, field)?),
            Self::Records(r) => value_text(r.get(row)?.get(field)?)?,
        };
        if is_null(&raw) { None } else { Some(raw) }
    }

    /// True for a table column, or a key present in at least one record.
    pub fn has_field(&self, field: &str) -> bool {
        match self {
            Self::Table(t) => t.has_column(field),
            Self::Records(r) => r.iter().any(|rec| rec.contains_key(field)),
        }
    }

    pub fn select(&self, indices: &[usize]) -> Content {
        match self {
            Self::Table(t) => Self::Table(t.select(indices)),
            Self::Records(r) => Self::Records(
                indices
                    .iter()
                    .filter_map(|&i| r.get(i).cloned())
                    .collect(),
            ),
        }
    }

    /// Parse `field` of every row strictly; nulls and unparseable values are errors.
    fn parse_versions(&self, field: &str, version_type: VersionType) -> Result<Vec<VersionValue>> {
        if !self.is_empty() && !self.has_field(field) {
            return Err(PipelineError::validation(format!(
                "version field '{}' is missing from the content",
                field
            )));
        }
        (0..self.len())
            .map(|row| {
                let raw = self.text(row, field).ok_or_else(|| {
                    PipelineError::validation(format!(
                        "row {} has a null value in version field '{}'",
                        row, field
                    ))
                })?;
                version_type.parse_field(field, &raw)
            })
            .collect()
    }

    /// Rows whose `field` is strictly greater than `threshold`.
    pub fn filter_newer(
        &self,
        field: &str,
        threshold: VersionValue,
        version_type: VersionType,
    ) -> Result<Content> {
        let versions = self.parse_versions(field, version_type)?;
        let keep: Vec<usize> = versions
            .iter()
            .enumerate()
            .filter(|&(_, v)| v.partial_cmp(&threshold) == Some(Ordering::Greater))
            .map(|(i, _)| i)
            .collect();
        Ok(self.select(&keep))
    }

    /// Raw text of the greatest parsed `field` value. Null values are skipped.
    pub fn max_version(&self, field: &str, version_type: VersionType) -> Result<Option<String>> {
        let mut best: Option<(VersionValue, Cow<'_, str>)> = None;
        for row in 0..self.len() {
            let Some(raw) = self.text(row, field) else {
                continue;
            };
            let parsed = version_type.parse_field(field, &raw)?;
            let replace = match &best {
                None => true,
                Some((current, _)) => parsed.partial_cmp(current) == Some(Ordering::Greater),
            };
            if replace {
                best = Some((parsed, raw));
            }
        }
        Ok(best.map(|(_, raw)| raw.into_owned()))
    }

    /// Add constant fields to every row. Existing fields win; each collision is logged once.
    pub fn inject_static_fields<'a>(&mut self, fields: impl IntoIterator<Item = (&'a str, &'a Value)>) {
        for (name, value) in fields {
            match &mut *self {
                Self::Table(t) => {
                    let fill = value_text(value).map(Cow::into_owned);
                    if !t.add_column(name, fill) {
                        warn!("static field '{}' collides with an existing column, keeping data", name);
                    }
                }
                Self::Records(records) => {
                    let mut collided = false;
                    for rec in records.iter_mut() {
                        if rec.contains_key(name) {
                            collided = true;
                        } else {
                            rec.insert(name.to_string(), value.clone());
                        }
                    }
                    if collided {
                        warn!("static field '{}' collides with an existing field, keeping data", name);
                    }
                }
            }
        }
    }
}

/// Text form of a JSON scalar, `None` for `null`. Arrays and objects render as JSON.
pub fn value_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        other => Some(Cow::Owned(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn records(v: Value) -> Content {
        let Value::Array(items) = v else { panic!("expected array") };
        Content::Records(
            items
                .into_iter()
                .map(|i| match i {
                    Value::Object(m) => m,
                    _ => panic!("expected object"),
                })
                .collect(),
        )
    }

    #[test]
    fn null_markers() {
        let c = records(json!([{"a": "nan"}, {"a": "None"}, {"a": ""}, {"a": null}, {}, {"a": 0}]));
        for row in 0..5 {
            assert_eq!(c.text(row, "a"), None, "row {}", row);
        }
        assert_eq!(c.text(5, "a").as_deref(), Some("0"));
    }

    #[test]
    fn concat_rejects_mixed_kinds() {
        let err = Content::empty(ContentKind::Table)
            .concat(Content::empty(ContentKind::Records))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataValidation(_)));
    }

    #[test]
    fn filter_newer_is_strict() {
        let c = records(json!([
            {"id": 1, "created_at": "2023-01-01"},
            {"id": 2, "created_at": "2023-01-02"},
            {"id": 3, "created_at": "2023-01-03"},
        ]));
        let threshold = VersionType::Datetime.parse("2023-01-02").unwrap();
        let out = c.filter_newer("created_at", threshold, VersionType::Datetime).unwrap();
        assert_eq!(out, records(json!([{"id": 3, "created_at": "2023-01-03"}])));
    }

    #[test]
    fn filter_newer_rejects_null_versions() {
        let c = records(json!([{"created_at": "2023-01-01"}, {"created_at": null}]));
        let err = c
            .filter_newer("created_at", VersionType::Datetime.floor(), VersionType::Datetime)
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataValidation(_)));
    }

    #[test]
    fn filter_newer_requires_field_on_non_empty_content() {
        let c = records(json!([{"id": 1}]));
        assert!(c.filter_newer("created_at", VersionType::Numeric.floor(), VersionType::Numeric).is_err());
        let empty = Content::empty(ContentKind::Records);
        assert!(empty.filter_newer("created_at", VersionType::Numeric.floor(), VersionType::Numeric).is_ok());
    }

    #[test]
    fn max_version_keeps_raw_text_and_skips_nulls() {
        let c = records(json!([{"v": "9"}, {"v": null}, {"v": "10.5"}, {"v": "nan"}]));
        assert_eq!(c.max_version("v", VersionType::Numeric).unwrap(), Some("10.5".to_string()));
        let nothing = records(json!([{"v": null}]));
        assert_eq!(nothing.max_version("v", VersionType::Numeric).unwrap(), None);
    }

    #[test]
    fn static_fields_never_overwrite() {
        let mut c = records(json!([{"sport": "tennis"}, {"id": 2}]));
        c.inject_static_fields([("sport", &json!("football"))]);
        assert_eq!(c, records(json!([{"sport": "tennis"}, {"id": 2, "sport": "football"}])));

        let mut t = Content::Table(Table::from_rows(["id"], vec![vec![Some("1".into())]]).unwrap());
        t.inject_static_fields([("season", &json!(2024)), ("id", &json!("x"))]);
        let t = t.as_table().unwrap();
        assert_eq!(t.columns(), &["id", "season"]);
        assert_eq!(t.get(0, "season"), Some("2024"));
        assert_eq!(t.get(0, "id"), Some("1"));
    }
}
