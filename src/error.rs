// src/error.rs

use std::time::Duration;
use thiserror::Error;

/// Result type alias used across the library.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Every failure the fetch/decode/aggregate core can surface.
///
/// None of these are recovered from locally: whichever one occurs first is
/// handed back to the caller of the pipeline entry point.
#[derive(Error, Debug)]
pub enum StatsError {
    /// Header and data counts disagree, or a header cell is malformed.
    #[error("shape error: {0}")]
    Shape(String),

    /// A cell, document or archive could not be cleaned and parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A task exceeded its overall deadline.
    #[error("timed out after {limit:?} fetching {source_url}")]
    Timeout { source_url: String, limit: Duration },

    /// Decoded data does not satisfy its validation rule.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Connection, status or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl StatsError {
    pub fn shape(msg: impl Into<String>) -> Self {
        StatsError::Shape(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        StatsError::Parse(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        StatsError::Integrity(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        StatsError::Transport(msg.into())
    }
}

impl From<reqwest::Error> for StatsError {
    fn from(err: reqwest::Error) -> Self {
        StatsError::Transport(err.to_string())
    }
}

impl From<zip::result::ZipError> for StatsError {
    fn from(err: zip::result::ZipError) -> Self {
        StatsError::Parse(format!("reading archive: {}", err))
    }
}

impl From<csv::Error> for StatsError {
    fn from(err: csv::Error) -> Self {
        StatsError::Parse(format!("reading delimited text: {}", err))
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        StatsError::Parse(format!("reading JSON document: {}", err))
    }
}
