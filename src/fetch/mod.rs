// src/fetch/mod.rs

pub mod urls;

use futures_util::TryStreamExt;
use reqwest::Client;
use std::{io, time::Duration};
use tokio::{io::AsyncReadExt, time::Instant};
use tokio_util::io::StreamReader;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{Result, StatsError};

/// Bytes requested from the body stream per read.
pub const CHUNK_SIZE: usize = 1024;

/// One file to download and decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    /// Unique key of this task's result, by default the file name.
    pub identifier: String,
    pub source: Url,
    pub timeout: Duration,
}

impl FetchTask {
    pub fn new(source: Url, timeout: Duration) -> Self {
        Self {
            identifier: urls::file_name(&source),
            source,
            timeout,
        }
    }
}

/// Time gate for progress logging during a long transfer.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    last: Instant,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    /// True at most once per `interval`; resets the gate when it fires.
    pub fn due_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) > self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }

    pub fn due(&mut self) -> bool {
        self.due_at(Instant::now())
    }
}

/// Download `source` into memory, failing if the whole transfer takes longer
/// than `timeout`. A timed-out transfer yields no bytes at all.
#[instrument(level = "debug", skip(client, heartbeat_interval), fields(url = %source))]
pub async fn fetch(
    client: &Client,
    source: &Url,
    timeout: Duration,
    heartbeat_interval: Duration,
) -> Result<Vec<u8>> {
    match tokio::time::timeout(timeout, stream_to_buffer(client, source, heartbeat_interval)).await {
        Ok(res) => res,
        Err(_) => Err(StatsError::Timeout {
            source_url: source.to_string(),
            limit: timeout,
        }),
    }
}

async fn stream_to_buffer(
    client: &Client,
    source: &Url,
    heartbeat_interval: Duration,
) -> Result<Vec<u8>> {
    let file = urls::file_name(source);
    info!(file = %file, "attempting download of {}", source);

    let response = client
        .get(source.clone())
        .send()
        .await?
        .error_for_status()?;

    let body = response
        .bytes_stream()
        .map_err(io::Error::other);
    let mut reader = StreamReader::new(Box::pin(body));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut heartbeat = Heartbeat::new(heartbeat_interval);

    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| StatsError::transport(format!("reading body of {}: {}", source, e)))?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if heartbeat.due() {
            info!(file = %file, bytes_written = buffer.len(), "still downloading");
        }
    }

    debug!(file = %file, bytes = buffer.len(), "download complete");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{capture_logs, client, serve, Route};

    #[test]
    fn heartbeat_fires_at_most_once_per_interval() {
        let start = Instant::now();
        let mut hb = Heartbeat::starting_at(Duration::from_secs(15), start);

        assert!(!hb.due_at(start + Duration::from_secs(1)));
        assert!(!hb.due_at(start + Duration::from_secs(15)));
        assert!(hb.due_at(start + Duration::from_secs(16)));
        // gate reset at 16s
        assert!(!hb.due_at(start + Duration::from_secs(30)));
        assert!(hb.due_at(start + Duration::from_secs(32)));
    }

    #[test]
    fn task_identifier_is_file_name() {
        let url = Url::parse("https://www.hkex.com.hk/eng/cbbc/download/CBBC07.zip").unwrap();
        let task = FetchTask::new(url, Duration::from_secs(1));
        assert_eq!(task.identifier, "CBBC07.zip");
    }

    #[tokio::test]
    async fn fetches_whole_body_across_chunks() {
        let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let base = serve(vec![("/big.bin", Route::Body(body.clone()))]).await;
        let url = base.join("big.bin").unwrap();

        let client = client();
        let got = fetch(&client, &url, Duration::from_secs(5), Duration::from_secs(15))
            .await
            .unwrap();
        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn zero_interval_logs_progress_while_streaming() {
        let (_guard, logs) = capture_logs();
        let body = vec![7u8; 10 * CHUNK_SIZE];
        let base = serve(vec![("/CBBC01.zip", Route::Body(body.clone()))]).await;
        let url = base.join("CBBC01.zip").unwrap();

        let got = fetch(&client(), &url, Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(got.len(), body.len());

        let out = logs.contents();
        assert!(out.contains("still downloading"), "{}", out);
        assert!(out.contains("file=CBBC01.zip"), "{}", out);
        assert!(out.contains("bytes_written="), "{}", out);
    }

    #[tokio::test]
    async fn error_status_is_a_transport_error() {
        let base = serve(vec![("/missing.zip", Route::Status(404))]).await;
        let url = base.join("missing.zip").unwrap();

        let res = fetch(&client(), &url, Duration::from_secs(5), Duration::from_secs(15)).await;
        assert!(matches!(res, Err(StatsError::Transport(_))), "{:?}", res);
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let base = serve(vec![("/slow.zip", Route::Stall)]).await;
        let url = base.join("slow.zip").unwrap();

        let res = fetch(
            &client(),
            &url,
            Duration::from_millis(300),
            Duration::from_secs(15),
        )
        .await;
        match res {
            Err(StatsError::Timeout { source_url, limit }) => {
                assert!(source_url.ends_with("slow.zip"));
                assert_eq!(limit, Duration::from_millis(300));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("http://127.0.0.1:{}/CBBC01.zip", port)).unwrap();
        let res = fetch(&client(), &url, Duration::from_secs(5), Duration::from_secs(15)).await;
        assert!(matches!(res, Err(StatsError::Transport(_))), "{:?}", res);
    }
}
