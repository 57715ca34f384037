// src/table/header.rs

use serde::Deserialize;
use std::collections::VecDeque;

use crate::error::{Result, StatsError};

fn single_column() -> u32 {
    1
}

/// One cell of a published table header.
///
/// `span == 1` is a leaf that owns exactly one data column. `span > 1` is a
/// grouping cell whose text prefixes the next `span` leaves after it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderCell {
    pub text: String,
    #[serde(rename = "colspan", default = "single_column")]
    pub span: u32,
}

impl HeaderCell {
    pub fn new(text: impl Into<String>, span: u32) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }

    pub fn leaf(text: impl Into<String>) -> Self {
        Self::new(text, 1)
    }

    pub fn is_group(&self) -> bool {
        self.span > 1
    }
}

/// A grouping cell still owed `remaining` leaf columns.
struct PendingGroup<'a> {
    text: &'a str,
    remaining: u32,
}

/// Flatten a colspan-encoded header into one name per data column.
///
/// Grouping cells are queued and matched to following leaves in FIFO order.
/// Overlapping groups are therefore assigned by arrival, not by visual
/// nesting; downstream column lookups depend on that ordering.
pub fn reconstruct(cells: &[HeaderCell]) -> Result<Vec<String>> {
    let mut pending: VecDeque<PendingGroup<'_>> = VecDeque::new();
    let mut columns = Vec::with_capacity(cells.len());

    for (pos, cell) in cells.iter().enumerate() {
        if cell.span == 0 {
            return Err(StatsError::shape(format!(
                "header cell {} ({:?}) has a colspan of 0",
                pos, cell.text
            )));
        }

        if cell.is_group() {
            pending.push_back(PendingGroup {
                text: &cell.text,
                remaining: cell.span,
            });
            continue;
        }

        match pending.front_mut() {
            Some(group) => {
                columns.push(format!("{}-{}", group.text, cell.text));
                group.remaining -= 1;
                if group.remaining == 0 {
                    pending.pop_front();
                }
            }
            None => columns.push(cell.text.clone()),
        }
    }

    Ok(columns)
}
