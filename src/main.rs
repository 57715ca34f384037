use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hkexstats::{aggregate, pipeline, AggregateOptions, Config, TypedTable, ValueKind};
use std::{fmt::Display, io};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "hkexstats",
    about = "Download HKEX statistics files and print them as clean CSV"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Yearly index options statistics, one row per year.
    Options {
        /// Exchange code used in the statistics file name (e.g. HSI, HHI).
        symbol: String,
    },
    /// Daily CBBC activity on one underlying, summed over all twelve files.
    Cbbc {
        /// Underlying as written in the CBBC files (e.g. HSI, HSCEI, 00700).
        underlying: String,

        /// Quantity to sum per trade date.
        #[arg(long, value_enum, default_value_t = Value::IndexUnits)]
        value: Value,

        /// One column per issuer instead of a single total.
        #[arg(long, default_value_t = false)]
        by_issuer: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Value {
    IndexUnits,
    Turnover,
    Volume,
}

impl From<Value> for ValueKind {
    fn from(v: Value) -> Self {
        match v {
            Value::IndexUnits => ValueKind::IndexUnits,
            Value::Turnover => ValueKind::Turnover,
            Value::Volume => ValueKind::Volume,
        }
    }
}

fn write_csv<K: Display>(table: &TypedTable<K>) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    let mut header = vec![table.index_name.clone()];
    header.extend(table.columns.iter().cloned());
    wtr.write_record(&header)?;
    for (key, row) in table.index.iter().zip(&table.values) {
        let mut record = vec![key.to_string()];
        record.extend(row.iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("reading HKEXSTATS_* settings")?;
    let start = Instant::now();

    match cli.command {
        Commands::Options { symbol } => {
            let table = pipeline::fetch_yearly_statistics(&config, &symbol)
                .await
                .with_context(|| format!("yearly statistics for {}", symbol))?;
            write_csv(&table)?;
        }
        Commands::Cbbc {
            underlying,
            value,
            by_issuer,
        } => {
            let dataset = pipeline::fetch_cbbc(&config)
                .await
                .context("downloading CBBC files")?;
            let options = AggregateOptions {
                underlying: underlying.trim().to_uppercase(),
                value: value.into(),
                by_issuer,
            };
            let table = aggregate(dataset, &options)?;
            if table.is_empty() {
                info!("no CBBC volume for underlying {}", options.underlying);
                return Ok(());
            }
            write_csv(&table)?;
        }
    }

    info!(elapsed = ?start.elapsed(), "done");
    Ok(())
}
