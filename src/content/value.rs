//! Typed interpretation of version fields (datetime or numeric).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::PipelineError;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// How the values of a version field are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionType {
    #[default]
    Datetime,
    Numeric,
}

impl VersionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Datetime => "datetime",
            Self::Numeric => "numeric",
        }
    }

    /// Parse a raw value, `None` when it does not match the type.
    pub fn parse(self, raw: &str) -> Option<VersionValue> {
        match self {
            Self::Datetime => parse_datetime(raw).map(VersionValue::Datetime),
            Self::Numeric => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(VersionValue::Numeric),
        }
    }

    /// Like [`VersionType::parse`] but reports which field failed.
    pub fn parse_field(self, field: &str, raw: &str) -> crate::Result<VersionValue> {
        self.parse(raw).ok_or_else(|| {
            PipelineError::validation(format!(
                "value {:?} of field '{}' is not a valid {}",
                raw,
                field,
                self.as_str()
            ))
        })
    }

    /// Lowest threshold used when no cutoff has been recorded yet.
    pub fn floor(self) -> VersionValue {
        match self {
            Self::Datetime => VersionValue::Datetime(
                NaiveDate::from_ymd_opt(1900, 1, 1)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .unwrap_or(NaiveDateTime::MIN),
            ),
            Self::Numeric => VersionValue::Numeric(0.0),
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "datetime" => Ok(Self::Datetime),
            "numeric" => Ok(Self::Numeric),
            other => Err(PipelineError::config(format!(
                "unknown version type '{}', expected 'datetime' or 'numeric'",
                other
            ))),
        }
    }
}

/// A parsed version value. Values of different variants are never compared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum VersionValue {
    Datetime(NaiveDateTime),
    Numeric(f64),
}

/// Parse the datetime shapes found in source files. Offsets are normalized to UTC.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
