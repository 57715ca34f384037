// src/aggregate/mod.rs

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, StatsError};
use crate::table::{parse_number, RawTable, TypedTable};

pub const TRADE_DATE: &str = "Trade Date";
pub const UNDERLYING: &str = "Underlying";
pub const ISSUER: &str = "Issuer";
pub const VOLUME: &str = "Volume";
pub const ENT_RATIO: &str = "Ent. Ratio";
pub const TURNOVER: &str = "Turnover";
pub const INDEX_UNITS_TRADED: &str = "index units traded";

/// Pivot column for rows with a blank issuer; brackets keep it apart from
/// any real issuer code.
pub const NO_ISSUER: &str = "(no issuer)";

/// Quantity summed per trade date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// `Volume / Ent. Ratio`: underlying units the traded warrants represent.
    #[default]
    IndexUnits,
    Turnover,
    Volume,
}

impl ValueKind {
    pub fn column_name(self) -> &'static str {
        match self {
            ValueKind::IndexUnits => INDEX_UNITS_TRADED,
            ValueKind::Turnover => TURNOVER,
            ValueKind::Volume => VOLUME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Exchange code of the underlying, e.g. "HSI" or "00700".
    pub underlying: String,
    pub value: ValueKind,
    /// Pivot issuers into columns instead of summing across them.
    pub by_issuer: bool,
}

/// Strip `*` and `^` decorations and spell out `%`.
pub fn normalize_column_name(name: &str) -> String {
    name.replace(['*', '^'], "")
        .replace('%', "percent")
        .trim()
        .to_string()
}

/// Stack tables row-wise in key order; columns are the union in first-seen
/// order and cells a table lacks are left empty.
pub fn concat(tables: BTreeMap<String, RawTable>) -> RawTable {
    let mut columns: Vec<String> = Vec::new();
    for table in tables.values() {
        for c in &table.columns {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(tables.values().map(RawTable::len).sum());
    for table in tables.into_values() {
        let positions: Vec<usize> = table
            .columns
            .iter()
            .map(|c| columns.iter().position(|u| u == c).unwrap_or_default())
            .collect();
        for row in table.rows {
            let mut out = vec![String::new(); columns.len()];
            for (cell, &pos) in row.into_iter().zip(&positions) {
                out[pos] = cell;
            }
            rows.push(out);
        }
    }

    RawTable { columns, rows }
}

/// Normalise every column name; columns that collapse onto the same name
/// are merged, keeping the first non-empty cell.
pub fn normalize_columns(table: RawTable) -> RawTable {
    let mut columns: Vec<String> = Vec::new();
    let mut targets = Vec::with_capacity(table.columns.len());
    for c in &table.columns {
        let name = normalize_column_name(c);
        let pos = match columns.iter().position(|u| *u == name) {
            Some(pos) => pos,
            None => {
                columns.push(name);
                columns.len() - 1
            }
        };
        targets.push(pos);
    }

    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            let mut out = vec![String::new(); columns.len()];
            for (cell, &pos) in row.into_iter().zip(&targets) {
                if out[pos].is_empty() {
                    out[pos] = cell;
                }
            }
            out
        })
        .collect();

    RawTable { columns, rows }
}

/// Trade dates as published: `YYYY-MM-DD`, `YYYY/MM/DD`, `DD/MM/YYYY` or `YYYYMMDD`.
pub fn parse_trade_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();
    ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| StatsError::parse(format!("{:?} is not a trade date", raw)))
}

struct Columns {
    underlying: usize,
    trade_date: usize,
    volume: usize,
    ent_ratio: usize,
    turnover: usize,
    issuer: Option<usize>,
}

impl Columns {
    fn locate(table: &RawTable) -> Result<Self> {
        let find = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| StatsError::integrity(format!("column {:?} missing after merge", name)))
        };
        Ok(Self {
            underlying: find(UNDERLYING)?,
            trade_date: find(TRADE_DATE)?,
            volume: find(VOLUME)?,
            ent_ratio: find(ENT_RATIO)?,
            turnover: find(TURNOVER)?,
            issuer: table.column_index(ISSUER),
        })
    }

    fn value(&self, kind: ValueKind, row: &[String]) -> Result<f64> {
        match kind {
            ValueKind::Volume => parse_number(&row[self.volume]),
            ValueKind::Turnover => parse_number(&row[self.turnover]),
            ValueKind::IndexUnits => {
                let volume = parse_number(&row[self.volume])?;
                let ratio = parse_number(&row[self.ent_ratio])?;
                if ratio == 0.0 {
                    return Err(StatsError::parse(format!(
                        "{} of 0 for a row dated {}",
                        ENT_RATIO, row[self.trade_date]
                    )));
                }
                Ok(volume / ratio)
            }
        }
    }
}

/// Merge validated per-file tables into a daily series for one underlying.
pub fn aggregate(
    tables: BTreeMap<String, RawTable>,
    options: &AggregateOptions,
) -> Result<TypedTable<NaiveDate>> {
    let merged = normalize_columns(concat(tables));
    let cols = Columns::locate(&merged)?;
    let issuer_idx = match (options.by_issuer, cols.issuer) {
        (true, None) => {
            return Err(StatsError::integrity(format!(
                "issuer breakdown requested but no {:?} column present",
                ISSUER
            )))
        }
        (true, Some(idx)) => Some(idx),
        (false, _) => None,
    };

    let wanted = options.underlying.trim();
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
    let mut groups: BTreeSet<String> = BTreeSet::new();

    for row in merged.rows.iter().filter(|r| r[cols.underlying].trim() == wanted) {
        let date = parse_trade_date(&row[cols.trade_date])?;
        let value = cols.value(options.value, row)?;
        let group = match issuer_idx {
            Some(idx) if !row[idx].trim().is_empty() => row[idx].trim().to_string(),
            Some(_) => NO_ISSUER.to_string(),
            None => options.value.column_name().to_string(),
        };

        *by_date.entry(date).or_default().entry(group.clone()).or_insert(0.0) += value;
        groups.insert(group);
    }

    let columns: Vec<String> = if issuer_idx.is_some() {
        groups.into_iter().collect()
    } else {
        vec![options.value.column_name().to_string()]
    };

    let mut table = TypedTable::empty(TRADE_DATE, columns);
    for (date, sums) in by_date {
        let row = table
            .columns
            .iter()
            .map(|c| sums.get(c).copied().unwrap_or(0.0))
            .collect();
        table.index.push(date);
        table.values.push(row);
    }

    Ok(table)
}
