//! In-memory table model shared by every query operation
//!
//! A [`Table`] is an ordered list of named columns of equal length. Tables are
//! never mutated after construction; every operation that narrows a table
//! (row selection, projection, preview) returns a new one.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Parse a raw cell as read from a delimited file.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole numbers print without the trailing ".0" spreadsheets never show
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{:.0}", n),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

/// Declared kind of a column, uniform over its non-missing cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Number,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    /// Build a column from already-typed cells.
    ///
    /// The column is numeric only when every non-missing cell is a number;
    /// otherwise numeric cells are demoted to their text form.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let numeric = values
            .iter()
            .all(|v| matches!(v, Value::Number(_) | Value::Missing));

        let (kind, values) = if numeric {
            (ColumnKind::Number, values)
        } else {
            let values = values
                .into_iter()
                .map(|v| match v {
                    Value::Number(_) => Value::Text(v.to_string()),
                    other => other,
                })
                .collect();
            (ColumnKind::Text, values)
        };

        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Build a column from raw strings (CSV cells, SQLite text).
    pub fn from_raw<S: AsRef<str>>(name: impl Into<String>, raw: &[S]) -> Self {
        let parsed: Vec<Value> = raw.iter().map(|r| Value::parse(r.as_ref())).collect();
        let numeric = parsed
            .iter()
            .all(|v| matches!(v, Value::Number(_) | Value::Missing));

        if numeric {
            return Self {
                name: name.into(),
                kind: ColumnKind::Number,
                values: parsed,
            };
        }

        // Mixed column: keep the original spelling of every non-empty cell
        let values = raw
            .iter()
            .zip(parsed)
            .map(|(r, v)| match v {
                Value::Missing => Value::Missing,
                _ => Value::Text(r.as_ref().to_string()),
            })
            .collect();

        Self {
            name: name.into(),
            kind: ColumnKind::Text,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn non_null_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_missing()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Create a table, checking that all columns share one row count.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(QueryError::Load(format!(
                    "column {:?} has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    expected
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Cells of one row, in column order
    pub fn row(&self, row: usize) -> Vec<&Value> {
        self.columns
            .iter()
            .filter_map(|c| c.values.get(row))
            .collect()
    }

    /// New table holding only the given rows (full column set).
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                kind: c.kind,
                values: rows
                    .iter()
                    .filter_map(|&r| c.values.get(r).cloned())
                    .collect(),
            })
            .collect();
        Table { columns }
    }

    /// New table holding only the named columns, in the order given.
    /// Names that do not exist are skipped.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Table {
        let columns = names
            .iter()
            .filter_map(|n| self.column(n.as_ref()).cloned())
            .collect();
        Table { columns }
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Table {
        let rows: Vec<usize> = (0..self.row_count().min(n)).collect();
        self.select_rows(&rows)
    }
}
