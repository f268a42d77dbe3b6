//! `processing:` block: a processor name plus free-form parameters.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::spec::required;

#[derive(Debug, Clone, Deserialize)]
pub struct RawProcessingSpec {
    #[serde(default)]
    pub processor: Option<String>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSpec {
    pub processor: String,
    pub params: Params,
}

impl RawProcessingSpec {
    pub fn validate_and_build(&self, owner: &str) -> Result<ProcessingSpec> {
        let processor = required(self.processor.clone(), "processor", &format!("{}: processing", owner))?;
        if processor.trim().is_empty() {
            return Err(PipelineError::config(format!("{}: processor name is empty", owner)));
        }
        Ok(ProcessingSpec {
            processor,
            params: Params::new(self.params.clone()),
        })
    }
}

/// Processor parameters with typed accessors. Wrong or missing values are
/// `Configuration` errors naming the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(wrong_type(key, "a string", other)),
            None => Err(missing(key)),
        }
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(_) => self.str(key).map(Some),
        }
    }

    pub fn str_list(&self, key: &str) -> Result<Vec<String>> {
        self.opt_str_list(key)?.ok_or_else(|| missing(key))
    }

    pub fn opt_str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let Value::Array(items) = value else {
            return Err(wrong_type(key, "a list of strings", value));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(wrong_type(key, "a list of strings", other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn str_map(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let value = self.get(key).ok_or_else(|| missing(key))?;
        let Value::Object(map) = value else {
            return Err(wrong_type(key, "a mapping of strings", value));
        };
        map.iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                other => Err(wrong_type(key, "a mapping of strings", other)),
            })
            .collect()
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(wrong_type(key, "a boolean", other)),
        }
    }
}

fn missing(key: &str) -> PipelineError {
    PipelineError::config(format!("missing processor parameter '{}'", key))
}

fn wrong_type(key: &str, expected: &str, got: &Value) -> PipelineError {
    PipelineError::config(format!(
        "processor parameter '{}' must be {}, got {}",
        key, expected, got
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_other_key_is_a_parameter() {
        let raw: RawProcessingSpec = serde_json::from_value(json!({
            "processor": "remap_columns",
            "source": "espn",
            "columns": {"a": "b"},
            "keep_unmapped": false
        }))
        .unwrap();
        let spec = raw.validate_and_build("model 'm'").unwrap();
        assert_eq!(spec.processor, "remap_columns");
        assert_eq!(spec.params.str("source").unwrap(), "espn");
        assert_eq!(spec.params.str_map("columns").unwrap().get("a").map(String::as_str), Some("b"));
        assert!(!spec.params.bool_or("keep_unmapped", true).unwrap());
        assert!(spec.params.get("processor").is_none());
    }

    #[test]
    fn missing_processor_fails() {
        let raw: RawProcessingSpec = serde_json::from_value(json!({"source": "x"})).unwrap();
        assert!(raw.validate_and_build("m").is_err());
    }

    #[test]
    fn typed_accessors_report_mismatches() {
        let params = Params::new(
            json!({"n": 3, "list": ["a", 1]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(params.str("n").is_err());
        assert!(params.str("absent").is_err());
        assert_eq!(params.opt_str("absent").unwrap(), None);
        assert!(params.str_list("list").is_err());
        assert!(params.bool_or("n", true).is_err());
    }
}
