// src/table/mod.rs

pub mod decode;
pub mod header;
pub mod json;

pub use decode::{decode, parse_number, to_typed};
pub use header::{reconstruct, HeaderCell};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// Flat column names, one per data column.
    pub columns: Vec<String>,
    /// Each data row as strings; always `columns.len()` cells wide.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Position of `name` among the columns, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A numeric table with one designated, ordered and unique row key.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedTable<K> {
    /// Name of the column the key was taken from (e.g. "Year").
    pub index_name: String,
    pub index: Vec<K>,
    pub columns: Vec<String>,
    /// Row-major values, `values[i]` belongs to `index[i]`.
    pub values: Vec<Vec<f64>>,
}

impl<K> TypedTable<K> {
    pub fn empty(index_name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            index_name: index_name.into(),
            index: Vec::new(),
            columns,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All values of column `name`, in key order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.values.iter().map(|row| row[idx]).collect())
    }

    /// Values of the row keyed by `key`.
    pub fn row(&self, key: &K) -> Option<&[f64]>
    where
        K: PartialEq,
    {
        let idx = self.index.iter().position(|k| k == key)?;
        Some(&self.values[idx])
    }
}
