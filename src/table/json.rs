// src/table/json.rs

use serde::Deserialize;
use tracing::debug;

use super::{decode, reconstruct, to_typed, HeaderCell, RawTable, TypedTable};
use crate::error::{Result, StatsError};

/// Key column of the yearly derivatives statistics tables.
pub const YEAR_COLUMN: &str = "Year";

#[derive(Debug, Deserialize)]
struct StatsDocument {
    tables: Vec<JsonTable>,
}

#[derive(Debug, Deserialize)]
struct JsonTable {
    header: Vec<HeaderCell>,
    body: Vec<BodyCell>,
}

#[derive(Debug, Deserialize)]
struct BodyCell {
    text: String,
}

/// Parse the first table of a `{"tables": [...]}` document into rows.
pub fn parse_document(bytes: &[u8]) -> Result<RawTable> {
    let doc: StatsDocument = serde_json::from_slice(bytes)?;
    let table = doc
        .tables
        .into_iter()
        .next()
        .ok_or_else(|| StatsError::shape("document contains no tables"))?;

    let columns = reconstruct(&table.header)?;
    debug!(columns = columns.len(), cells = table.body.len(), "reconstructed header");

    let cells = table.body.into_iter().map(|c| c.text).collect();
    decode(columns, cells)
}

/// Yearly statistics keyed by year, every other column numeric.
pub fn yearly_statistics(bytes: &[u8]) -> Result<TypedTable<i64>> {
    let raw = parse_document(bytes)?;
    to_typed(&raw, YEAR_COLUMN)
}
