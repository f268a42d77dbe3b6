use std::io::{Read, Write};
use std::path::Path;

use crate::content::{Row, Table};
use crate::error::{PipelineError, Result};

/// Reads and writes [`Table`] content as CSV with a header line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvHandler;

impl CsvHandler {
    pub const WRITER: &'static str = "CsvHandler";

    pub fn decode(&self, input: impl Read, path: &Path) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(input);

        let headers = reader.headers().map_err(PipelineError::csv(path))?.clone();
        let mut table = Table::new(headers.iter());
        for record in reader.records() {
            let record = record.map_err(PipelineError::csv(path))?;
            let row: Row = record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect();
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn encode(&self, table: &Table, output: impl Write, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_writer(output);
        if !table.columns().is_empty() {
            writer
                .write_record(table.columns())
                .map_err(PipelineError::csv(path))?;
        }
        for row in table.rows() {
            writer
                .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
                .map_err(PipelineError::csv(path))?;
        }
        writer.flush().map_err(PipelineError::io(path))?;
        Ok(())
    }
}
