use chrono::format::{Item, StrftimeItems};
use serde_json::Value;

use crate::content::{Content, is_null, parse_datetime};
use crate::error::{PipelineError, Result};
use crate::processors::{Sources, source};
use crate::spec::Params;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `standardize_dates{source, fields, format}`: rewrite datetime fields in one format.
/// Nulls stay as they are.
pub fn standardize_dates(sources: &Sources, params: &Params) -> Result<Content> {
    let mut content = source(sources, params.str("source")?)?.clone();
    let fields = params.str_list("fields")?;
    let format = params.opt_str("format")?.unwrap_or(DEFAULT_DATE_FORMAT);
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(PipelineError::config(format!(
            "standardize_dates: invalid format {:?}",
            format
        )));
    }

    let convert = |field: &str, raw: &str| -> Result<String> {
        let dt = parse_datetime(raw).ok_or_else(|| {
            PipelineError::validation(format!(
                "standardize_dates: {:?} in field '{}' is not a datetime",
                raw, field
            ))
        })?;
        Ok(dt.format(format).to_string())
    };

    match &mut content {
        Content::Table(table) => {
            let missing = table.missing_columns(fields.iter().map(String::as_str));
            if !missing.is_empty() {
                return Err(PipelineError::validation(format!(
                    "standardize_dates: missing columns {}",
                    missing.join(", ")
                )));
            }
            let indices: Vec<(usize, &String)> = fields
                .iter()
                .filter_map(|f| table.column_index(f).map(|i| (i, f)))
                .collect();
            for row in table.rows_mut() {
                for &(idx, field) in &indices {
                    if let Some(raw) = row[idx].as_deref().filter(|r| !is_null(r)) {
                        row[idx] = Some(convert(field, raw)?);
                    }
                }
            }
        }
        Content::Records(records) => {
            for record in records.iter_mut() {
                for field in &fields {
                    let Some(Value::String(raw)) = record.get(field) else {
                        continue;
                    };
                    if is_null(raw) {
                        continue;
                    }
                    let formatted = convert(field, raw)?;
                    record.insert(field.clone(), Value::String(formatted));
                }
            }
        }
    }
    Ok(content)
}
