// src/fetch/urls.rs
use url::Url;

use crate::error::{Result, StatsError};

fn base_url(root: &str) -> Result<Url> {
    let mut root = root.trim().to_string();
    if !root.ends_with('/') {
        root.push('/');
    }
    Url::parse(&root).map_err(|e| StatsError::transport(format!("invalid URL root {:?}: {}", root, e)))
}

fn join(base: &Url, file: &str) -> Result<Url> {
    base.join(file)
        .map_err(|e| StatsError::transport(format!("joining {} onto {}: {}", file, base, e)))
}

/// `<root>/YearlyStatistics_O_<symbol>.json`
pub fn yearly_statistics_url(root: &str, symbol: &str) -> Result<Url> {
    let base = base_url(root)?;
    join(&base, &format!("YearlyStatistics_O_{}.json", symbol.trim()))
}

/// `<root>/CBBC01.zip` .. `<root>/CBBC<count>.zip`
pub fn cbbc_urls(root: &str, count: u32) -> Result<Vec<Url>> {
    let base = base_url(root)?;
    (1..=count)
        .map(|i| join(&base, &format!("CBBC{:02}.zip", i)))
        .collect()
}

/// Last non-empty path segment, used as a task identifier.
pub fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or(url.as_str())
        .to_string()
}
