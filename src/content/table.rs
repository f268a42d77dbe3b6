//! Column-oriented header plus row-major text cells, the in-memory form of a CSV file.

use crate::error::{PipelineError, Result};

pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table, checking that every row matches the header width.
    pub fn from_rows<I, S>(columns: I, rows: Vec<Row>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Names from `required` that are not columns of this table, in the given order.
    pub fn missing_columns<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect()
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::validation(format!(
                "row {} has {} cells but the table has {} columns",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append a row given as `(column, value)` pairs; columns not named are left empty.
    pub fn push_named<'a>(
        &mut self,
        values: impl IntoIterator<Item = (&'a str, Option<String>)>,
    ) -> Result<()> {
        let mut row: Row = vec![None; self.columns.len()];
        for (name, value) in values {
            let idx = self.column_index(name).ok_or_else(|| {
                PipelineError::validation(format!("table has no column '{}'", name))
            })?;
            row[idx] = value;
        }
        self.rows.push(row);
        Ok(())
    }

    /// Raw cell text, `None` for an empty cell or an unknown column.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Add a column holding `fill` in every row. Returns false if it already exists.
    pub fn add_column(&mut self, name: &str, fill: Option<String>) -> bool {
        if self.has_column(name) {
            return false;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        true
    }

    /// Concatenate rows. The header becomes the union of both headers (ours first);
    /// cells for columns a side lacks are empty.
    pub fn append(&mut self, other: Table) {
        let mut mapping = Vec::with_capacity(other.columns.len());
        for name in &other.columns {
            match self.column_index(name) {
                Some(idx) => mapping.push(idx),
                None => {
                    self.add_column(name, None);
                    mapping.push(self.columns.len() - 1);
                }
            }
        }
        let width = self.columns.len();
        for row in other.rows {
            let mut out: Row = vec![None; width];
            for (cell, &idx) in row.into_iter().zip(&mapping) {
                out[idx] = cell;
            }
            self.rows.push(out);
        }
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    pub fn retain_rows(&mut self, mut keep: impl FnMut(usize, &Row) -> bool) {
        let mut idx = 0;
        self.rows.retain(|row| {
            let keep_row = keep(idx, row);
            idx += 1;
            keep_row
        });
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn append_unions_columns() {
        let mut left = Table::from_rows(["id", "home"], vec![vec![cell("1"), cell("A")]]).unwrap();
        let right = Table::from_rows(["away", "id"], vec![vec![cell("B"), cell("2")]]).unwrap();
        left.append(right);

        assert_eq!(left.columns(), &["id", "home", "away"]);
        assert_eq!(
            left.rows(),
            &[
                vec![cell("1"), cell("A"), None],
                vec![cell("2"), None, cell("B")],
            ]
        );
    }

    #[test]
    fn push_row_checks_width() {
        let mut table = Table::new(["a", "b"]);
        assert!(table.push_row(vec![cell("1")]).is_err());
        assert!(table.push_row(vec![cell("1"), None]).is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn push_named_fills_missing_cells() {
        let mut table = Table::new(["a", "b", "c"]);
        table.push_named([("c", cell("3")), ("a", cell("1"))]).unwrap();
        assert_eq!(table.rows(), &[vec![cell("1"), None, cell("3")]]);
        assert!(table.push_named([("zzz", None)]).is_err());
    }

    #[test]
    fn missing_columns_keeps_order() {
        let table = Table::new(["id"]);
        assert_eq!(table.missing_columns(["x", "id", "y"]), vec!["x", "y"]);
    }
}
