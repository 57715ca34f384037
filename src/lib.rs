pub mod aggregate;
pub mod batch;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod table;

#[cfg(test)]
mod testutil;

pub use aggregate::{aggregate, AggregateOptions, ValueKind};
pub use batch::{decode_batch, DecodedBatch, ValidationRule};
pub use config::Config;
pub use error::{Result, StatsError};
pub use fetch::FetchTask;
pub use table::{HeaderCell, RawTable, TypedTable};
