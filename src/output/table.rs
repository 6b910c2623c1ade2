//! Column-aligned file table.
//!
//! ```text
//! [Code|Properties|Symbols]
//! out_0.bc|out_0.prop|out_0.sym
//! out_1.bc|out_1.prop|out_1.sym
//! ```

use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

pub const COL_CODE: &str = "Code";
pub const COL_PROPS: &str = "Properties";
pub const COL_SYM: &str = "Symbols";

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("column '{column}' has {found} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("invalid column name '{0}'")]
    InvalidColumnName(String),

    #[error("malformed table: {0}")]
    Malformed(String),
}

/// A table of file paths: one named column per artifact kind, one row per
/// output module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SimpleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. The first column fixes the row count; every later
    /// column must have exactly that many cells.
    pub fn add_column<S: Into<String>>(
        &mut self,
        name: &str,
        cells: impl IntoIterator<Item = S>,
    ) -> Result<(), TableError> {
        if name.is_empty() || name.contains(SEPARATOR) || name.contains(&['[', ']', '\n'][..]) {
            return Err(TableError::InvalidColumnName(name.to_string()));
        }
        if self.columns.iter().any(|c| c == name) {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        let cells: Vec<String> = cells.into_iter().map(Into::into).collect();

        if self.columns.is_empty() {
            self.rows = cells.into_iter().map(|cell| vec![cell]).collect();
        } else {
            if cells.len() != self.rows.len() {
                return Err(TableError::RowCountMismatch {
                    column: name.to_string(),
                    expected: self.rows.len(),
                    found: cells.len(),
                });
            }
            for (row, cell) in self.rows.iter_mut().zip(cells) {
                row.push(cell);
            }
        }
        self.columns.push(name.to_string());
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Cells of column `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{self}")
    }

    /// Read a table back from its text form.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| TableError::Malformed("missing header".to_string()))?;
        let names = header
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .ok_or_else(|| TableError::Malformed(format!("bad header '{header}'")))?;
        let columns: Vec<String> = names.split(SEPARATOR).map(str::to_string).collect();

        let mut rows = Vec::new();
        for line in lines {
            let row: Vec<String> = line.split(SEPARATOR).map(str::to_string).collect();
            if row.len() != columns.len() {
                return Err(TableError::Malformed(format!(
                    "row '{line}' has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }
}

impl fmt::Display for SimpleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.columns.join("|"))?;
        for row in &self.rows {
            writeln!(f, "{}", row.join("|"))?;
        }
        Ok(())
    }
}
