use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::content::{Content, Record, Table};
use crate::error::{PipelineError, Result};
use crate::processors::{Sources, source};
use crate::spec::Params;

/// `remap_columns{source, columns: {old: new}, keep_unmapped = true}`.
///
/// Renames are applied all at once, so `{a: b, b: a}` swaps two columns.
/// Mapped names absent from the data are ignored.
pub fn remap_columns(sources: &Sources, params: &Params) -> Result<Content> {
    let input = source(sources, params.str("source")?)?;
    let mapping = params.str_map("columns")?;
    let keep_unmapped = params.bool_or("keep_unmapped", true)?;

    match input {
        Content::Table(t) => remap_table(t, &mapping, keep_unmapped).map(Content::Table),
        Content::Records(records) => records
            .iter()
            .map(|r| remap_record(r, &mapping, keep_unmapped))
            .collect::<Result<Vec<_>>>()
            .map(Content::Records),
    }
}

fn remap_table(table: &Table, mapping: &BTreeMap<String, String>, keep_unmapped: bool) -> Result<Table> {
    let mut kept = Vec::new();
    let mut names = Vec::new();
    for (idx, column) in table.columns().iter().enumerate() {
        match mapping.get(column) {
            Some(new) => names.push(new.clone()),
            None if keep_unmapped => names.push(column.clone()),
            None => {
                debug!("remap_columns: dropping unmapped column '{}'", column);
                continue;
            }
        }
        kept.push(idx);
    }
    check_unique(&names)?;

    let rows = table
        .rows()
        .iter()
        .map(|row| kept.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Table::from_rows(names, rows)
}

fn remap_record(record: &Record, mapping: &BTreeMap<String, String>, keep_unmapped: bool) -> Result<Record> {
    let mut out = Record::new();
    for (key, value) in record {
        let name = match mapping.get(key) {
            Some(new) => new,
            None if keep_unmapped => key,
            None => continue,
        };
        if out.insert(name.clone(), value.clone()).is_some() {
            return Err(duplicate(name));
        }
    }
    Ok(out)
}

fn check_unique(names: &[String]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(duplicate(name));
        }
    }
    Ok(())
}

fn duplicate(name: &str) -> PipelineError {
    PipelineError::validation(format!("remap_columns produces column '{}' twice", name))
}
