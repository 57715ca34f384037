// src/config.rs

use anyhow::{Context, Result};
use std::{env, str::FromStr, time::Duration};

pub const DEFAULT_OPTIONS_URL_ROOT: &str = "https://www.hkex.com.hk/eng/stat/dmstat/marksum/";
pub const DEFAULT_CBBC_URL_ROOT: &str = "https://www.hkex.com.hk/eng/cbbc/download/";

/// Runtime settings for fetching and validating the exchange files.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding `YearlyStatistics_O_<symbol>.json`.
    pub options_url_root: String,
    /// Directory holding `CBBC01.zip` .. `CBBCnn.zip`.
    pub cbbc_url_root: String,
    pub cbbc_file_count: u32,
    /// Overall deadline of one download, connect to last byte.
    pub fetch_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Malformed rows every CBBC file is known to carry.
    pub expected_removed_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            options_url_root: DEFAULT_OPTIONS_URL_ROOT.to_string(),
            cbbc_url_root: DEFAULT_CBBC_URL_ROOT.to_string(),
            cbbc_file_count: 12,
            fetch_timeout: Duration::from_secs(600),
            heartbeat_interval: Duration::from_secs(15),
            expected_removed_count: 3,
        }
    }
}

impl Config {
    /// Defaults, overridden by any `HKEXSTATS_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(v) = lookup("HKEXSTATS_OPTIONS_URL_ROOT") {
            cfg.options_url_root = v;
        }
        if let Some(v) = lookup("HKEXSTATS_CBBC_URL_ROOT") {
            cfg.cbbc_url_root = v;
        }
        if let Some(v) = parse_var(&lookup, "HKEXSTATS_CBBC_FILE_COUNT")? {
            cfg.cbbc_file_count = v;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "HKEXSTATS_FETCH_TIMEOUT_SECS")? {
            cfg.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "HKEXSTATS_HEARTBEAT_SECS")? {
            cfg.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(v) = parse_var(&lookup, "HKEXSTATS_EXPECTED_REMOVED")? {
            cfg.expected_removed_count = v;
        }

        Ok(cfg)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value {:?} for {}", raw, key))
        })
        .transpose()
}
