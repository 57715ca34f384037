// src/table/decode.rs

use std::collections::BTreeMap;

use super::{RawTable, TypedTable};
use crate::error::{Result, StatsError};

/// Reshape a flat, row-major cell sequence into rows of `columns.len()`.
pub fn decode(columns: Vec<String>, flat_cells: Vec<String>) -> Result<RawTable> {
    let width = columns.len();
    if width == 0 {
        return Err(StatsError::shape(format!(
            "no columns to lay out {} data cells",
            flat_cells.len()
        )));
    }
    if flat_cells.len() % width != 0 {
        return Err(StatsError::shape(format!(
            "{} data cells do not divide into {} columns",
            flat_cells.len(),
            width
        )));
    }

    let rows = flat_cells
        .chunks_exact(width)
        .map(<[String]>::to_vec)
        .collect();

    Ok(RawTable { columns, rows })
}

/// Parse a numeric literal, dropping thousands separators first.
pub fn parse_number(raw: &str) -> Result<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(StatsError::parse(format!("{:?} is not a number", raw))),
    }
}

/// Leading whitespace-delimited token as an integer, e.g. "2020 (Jan-Jun)" -> 2020.
fn parse_key(raw: &str) -> Result<i64> {
    raw.split_whitespace()
        .next()
        .and_then(|tok| tok.parse::<i64>().ok())
        .ok_or_else(|| StatsError::parse(format!("{:?} is not an integer key", raw)))
}

/// Convert a string table into a numeric one keyed by `key_column`.
pub fn to_typed(raw: &RawTable, key_column: &str) -> Result<TypedTable<i64>> {
    let key_idx = raw.column_index(key_column).ok_or_else(|| {
        StatsError::shape(format!(
            "key column {:?} not among {:?}",
            key_column, raw.columns
        ))
    })?;

    let columns: Vec<String> = raw
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != key_idx)
        .map(|(_, c)| c.clone())
        .collect();

    let mut by_key: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for (row_no, row) in raw.rows.iter().enumerate() {
        if row.len() != raw.columns.len() {
            return Err(StatsError::shape(format!(
                "row {} has {} cells, expected {}",
                row_no,
                row.len(),
                raw.columns.len()
            )));
        }

        let key = parse_key(&row[key_idx])
            .map_err(|e| StatsError::parse(format!("row {}, column {:?}: {}", row_no, key_column, e)))?;

        let mut values = Vec::with_capacity(columns.len());
        for (col_idx, cell) in row.iter().enumerate() {
            if col_idx == key_idx {
                continue;
            }
            let v = parse_number(cell).map_err(|e| {
                StatsError::parse(format!(
                    "row {}, column {:?}: {}",
                    row_no, raw.columns[col_idx], e
                ))
            })?;
            values.push(v);
        }

        if by_key.insert(key, values).is_some() {
            return Err(StatsError::parse(format!(
                "duplicate {} key {} at row {}",
                key_column, key, row_no
            )));
        }
    }

    let (index, values) = by_key.into_iter().unzip();
    Ok(TypedTable {
        index_name: key_column.to_string(),
        index,
        columns,
        values,
    })
}
