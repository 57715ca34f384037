// src/pipeline/mod.rs

use futures::{stream::FuturesUnordered, StreamExt};
use reqwest::Client;
use std::{
    collections::{BTreeMap, HashSet},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{error, info, instrument};

use crate::batch::{decode_batch, ValidationRule};
use crate::config::Config;
use crate::error::{Result, StatsError};
use crate::fetch::{fetch, urls, FetchTask};
use crate::table::{json, RawTable, TypedTable};

/// Per-file tables keyed by task identifier, prior to aggregation.
pub type Dataset = BTreeMap<String, RawTable>;

/// One HTTP session shared by every task of a batch.
fn build_client() -> Result<Client> {
    let builder = Client::builder().user_agent(concat!("hkexstats/", env!("CARGO_PKG_VERSION")));
    // tests talk to a loopback server that no proxy can reach
    #[cfg(test)]
    let builder = builder.no_proxy();
    builder
        .build()
        .map_err(|e| StatsError::transport(format!("building HTTP client: {}", e)))
}

/// Fetch and decode every task concurrently; any single failure fails the
/// whole batch and cancels whatever is still in flight.
#[instrument(level = "info", skip_all, fields(tasks = tasks.len()))]
pub async fn run(
    tasks: &[FetchTask],
    rule: &ValidationRule,
    heartbeat_interval: Duration,
) -> Result<Dataset> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.identifier.as_str()) {
            return Err(StatsError::shape(format!(
                "task identifier {:?} used more than once",
                task.identifier
            )));
        }
    }

    let client = build_client()?;
    let start = Instant::now();

    let mut in_flight: FuturesUnordered<_> = tasks
        .iter()
        .map(|task| run_task(&client, task, rule, heartbeat_interval))
        .collect();

    let mut dataset = Dataset::new();
    while let Some(outcome) = in_flight.next().await {
        match outcome {
            Ok((identifier, table)) => {
                dataset.insert(identifier, table);
            }
            Err(err) => {
                error!(
                    error = %err,
                    completed = dataset.len(),
                    cancelled = in_flight.len(),
                    "batch failed"
                );
                return Err(err);
            }
        }
    }

    info!(files = dataset.len(), elapsed = ?start.elapsed(), "batch complete");
    Ok(dataset)
}

async fn run_task(
    client: &Client,
    task: &FetchTask,
    rule: &ValidationRule,
    heartbeat_interval: Duration,
) -> Result<(String, RawTable)> {
    let buffer = fetch(client, &task.source, task.timeout, heartbeat_interval).await?;
    let decoded = decode_batch(&buffer, rule)?;
    info!(
        file = %task.identifier,
        rows = decoded.table.len(),
        removed = decoded.removed,
        "decoded"
    );
    Ok((task.identifier.clone(), decoded.table))
}

/// The `CBBC01.zip`..`CBBCnn.zip` tasks described by `config`.
pub fn cbbc_tasks(config: &Config) -> Result<Vec<FetchTask>> {
    Ok(urls::cbbc_urls(&config.cbbc_url_root, config.cbbc_file_count)?
        .into_iter()
        .map(|url| FetchTask::new(url, config.fetch_timeout))
        .collect())
}

/// Download and validate the full CBBC batch.
pub async fn fetch_cbbc(config: &Config) -> Result<Dataset> {
    let tasks = cbbc_tasks(config)?;
    let rule = ValidationRule::cbbc(config.expected_removed_count);
    run(&tasks, &rule, config.heartbeat_interval).await
}

/// Download one yearly options statistics document and type it by year.
#[instrument(level = "info", skip(config))]
pub async fn fetch_yearly_statistics(config: &Config, symbol: &str) -> Result<TypedTable<i64>> {
    let url = urls::yearly_statistics_url(&config.options_url_root, symbol)?;
    info!("downloading data from {}", url);

    let client = build_client()?;
    let bytes = fetch(&client, &url, config.fetch_timeout, config.heartbeat_interval).await?;
    json::yearly_statistics(&bytes)
}
