// src/batch/mod.rs

use csv::ReaderBuilder;
use encoding_rs::UTF_16LE;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::{debug, info, instrument};
use zip::ZipArchive;

use crate::aggregate::normalize_column_name;
use crate::error::{Result, StatsError};
use crate::table::RawTable;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("digit pattern"));

/// Upper bound on the capacity reserved per compressed byte of an archive.
const MAX_INFLATION: u64 = 64;

pub const CBBC_CODE: &str = "CBBC Code";

/// Columns every CBBC export must carry, compared after name normalisation.
pub const CBBC_REQUIRED_COLUMNS: &[&str] = &[
    CBBC_CODE,
    "Underlying",
    "Volume",
    "Ent. Ratio",
    "Turnover",
    "Trade Date",
];

/// What a decoded file must look like before it may be aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRule {
    /// Exact number of rows the key filter must drop.
    pub expected_removed_count: usize,
    /// Column whose value must contain a run of digits.
    pub key_column: String,
    pub required_columns: Vec<String>,
}

impl ValidationRule {
    pub fn cbbc(expected_removed_count: usize) -> Self {
        Self {
            expected_removed_count,
            key_column: CBBC_CODE.to_string(),
            required_columns: CBBC_REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBatch {
    /// Rows that passed the key filter, key cells reduced to their digits.
    pub table: RawTable,
    pub original_rows: usize,
    pub removed: usize,
}

/// Unzip, decode and validate one downloaded export.
#[instrument(level = "debug", skip(buffer, rule), fields(bytes = buffer.len()))]
pub fn decode_batch(buffer: &[u8], rule: &ValidationRule) -> Result<DecodedBatch> {
    let (entry_name, raw_bytes) = first_entry(buffer)?;
    let text = decode_utf16(&raw_bytes, &entry_name)?;
    let table = parse_tab_separated(&text)?;
    debug!(entry = %entry_name, rows = table.len(), columns = table.columns.len(), "parsed entry");

    check_required_columns(&table, rule)?;
    let key_idx = find_column(&table, &rule.key_column).ok_or_else(|| {
        StatsError::integrity(format!("key column {:?} not found", rule.key_column))
    })?;

    let original_rows = table.len();
    let RawTable { columns, rows } = table;
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .filter_map(|mut row| {
            let digits = DIGIT_RUN.find(&row[key_idx])?.as_str().to_string();
            row[key_idx] = digits;
            Some(row)
        })
        .collect();

    let removed = original_rows - rows.len();
    info!(
        entry = %entry_name,
        original_rows,
        kept_rows = rows.len(),
        removed,
        "removed rows without a numeric {}", rule.key_column
    );

    if removed != rule.expected_removed_count {
        return Err(StatsError::integrity(format!(
            "{}: dropping rows without a numeric {} should remove {} records, removed {}",
            entry_name, rule.key_column, rule.expected_removed_count, removed
        )));
    }

    Ok(DecodedBatch {
        table: RawTable { columns, rows },
        original_rows,
        removed,
    })
}

fn first_entry(buffer: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(buffer))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_string();
        // declared size is untrusted input; cap the reservation
        let hint = entry.size().min(buffer.len() as u64 * MAX_INFLATION);
        let mut bytes = Vec::with_capacity(hint as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| StatsError::parse(format!("reading {} from archive: {}", name, e)))?;
        return Ok((name, bytes));
    }
    Err(StatsError::parse("archive contains no files"))
}

/// UTF-16 text; a BOM picks the byte order, little-endian otherwise.
fn decode_utf16(bytes: &[u8], entry_name: &str) -> Result<String> {
    let (text, encoding, had_errors) = UTF_16LE.decode(bytes);
    if had_errors {
        return Err(StatsError::parse(format!(
            "{} is not valid {} text",
            entry_name,
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

fn parse_tab_separated(text: &str) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if columns.is_empty() {
        return Err(StatsError::shape("delimited file has no header"));
    }

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() > columns.len() {
            return Err(StatsError::shape(format!(
                "record {} has {} fields, header has {}",
                idx,
                record.len(),
                columns.len()
            )));
        }
        let mut row: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }

    Ok(RawTable { columns, rows })
}

fn find_column(table: &RawTable, wanted: &str) -> Option<usize> {
    let wanted = normalize_column_name(wanted);
    table
        .columns
        .iter()
        .position(|c| normalize_column_name(c) == wanted)
}

fn check_required_columns(table: &RawTable, rule: &ValidationRule) -> Result<()> {
    let missing: Vec<&str> = rule
        .required_columns
        .iter()
        .filter(|c| find_column(table, c).is_none())
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StatsError::integrity(format!(
            "missing required columns {:?}; found {:?}",
            missing, table.columns
        )))
    }
}
