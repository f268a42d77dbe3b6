//! YAML -> JSON conversion with custom tag resolution.

use chrono::{Duration, NaiveDateTime};
use serde_json::{Map, Number, Value};
use serde_yaml::value::TaggedValue;

use crate::error::{PipelineError, Result};

pub const DATE_OFFSET_TAG: &str = "date_offset";
pub const DATE_OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Converts parsed YAML into JSON, resolving tags against a fixed reference time.
#[derive(Debug, Clone, Copy)]
pub struct TagResolver {
    now: NaiveDateTime,
}

impl TagResolver {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn to_json(&self, v: &serde_yaml::Value) -> Result<Value> {
        match v {
            serde_yaml::Value::Null => Ok(Value::Null),
            serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Number(i.into()))
                } else if let Some(u) = n.as_u64() {
                    Ok(Value::Number(u.into()))
                } else {
                    n.as_f64()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .ok_or_else(|| PipelineError::config(format!("unsupported number in yaml: {}", n)))
                }
            }
            serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
            serde_yaml::Value::Sequence(seq) => seq
                .iter()
                .map(|item| self.to_json(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            serde_yaml::Value::Mapping(map) => {
                let mut obj = Map::new();
                for (k, v) in map {
                    let key = match k {
                        serde_yaml::Value::String(s) => s.clone(),
                        serde_yaml::Value::Number(n) => n.to_string(),
                        serde_yaml::Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(PipelineError::config(format!(
                                "unsupported mapping key in yaml: {:?}",
                                other
                            )));
                        }
                    };
                    obj.insert(key, self.to_json(v)?);
                }
                Ok(Value::Object(obj))
            }
            serde_yaml::Value::Tagged(tagged) => self.resolve_tag(tagged),
        }
    }

    fn resolve_tag(&self, tagged: &TaggedValue) -> Result<Value> {
        let tag = tagged.tag.to_string();
        match tag.trim_start_matches('!') {
            DATE_OFFSET_TAG => {
                let days = match &tagged.value {
                    serde_yaml::Value::Number(n) => n.as_i64(),
                    serde_yaml::Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(|| {
                    PipelineError::config(format!(
                        "{} expects an integer number of days, got {:?}",
                        tag, tagged.value
                    ))
                })?;
                let shifted = Duration::try_days(days)
                    .and_then(|d| self.now.checked_add_signed(d))
                    .ok_or_else(|| PipelineError::config(format!("{} {} is out of range", tag, days)))?;
                Ok(Value::String(shifted.format(DATE_OFFSET_FORMAT).to_string()))
            }
            _ => Err(PipelineError::config(format!("unknown yaml tag {}", tag))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> TagResolver {
        TagResolver::new(
            NaiveDateTime::parse_from_str("2024-03-01 12:30:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        )
    }

    fn convert(text: &str) -> Result<Value> {
        let y: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
        resolver().to_json(&y)
    }

    #[test]
    fn date_offset_shifts_from_now() {
        let v = convert("from: !date_offset -2\nto: !date_offset 5\n").unwrap();
        assert_eq!(v, json!({"from": "2024-02-28 12:30:00", "to": "2024-03-06 12:30:00"}));
    }

    #[test]
    fn unknown_tags_and_bad_offsets_fail() {
        assert!(matches!(convert("x: !include other.yml"), Err(PipelineError::Configuration(_))));
        assert!(matches!(convert("x: !date_offset soon"), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn plain_documents_convert() {
        let v = convert("a: [1, 2.5, true, null]\n3: x\n").unwrap();
        assert_eq!(v, json!({"a": [1, 2.5, true, null], "3": "x"}));
    }
}
