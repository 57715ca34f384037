// src/testutil.rs
//
// Minimal HTTP/1.1 server for exercising the fetcher and pipeline offline.

use std::{
    collections::HashMap,
    io::Write,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

#[derive(Clone, Debug)]
pub enum Route {
    /// 200 with this body.
    Body(Vec<u8>),
    /// Bare status, empty body.
    Status(u16),
    /// Headers promise a body that never finishes arriving.
    Stall,
}

/// HTTP client that ignores proxy settings from the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn init_logging() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Log sink shared between a test and the subscriber writing into it.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's events into a buffer until the guard is dropped.
pub fn capture_logs() -> (tracing::subscriber::DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}

/// Serve `routes` on an ephemeral local port; returns the base URL.
pub async fn serve(routes: Vec<(&str, Route)>) -> Url {
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, route)| (path.to_string(), route))
            .collect(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let _ = respond(socket, &routes).await;
            });
        }
    });

    Url::parse(&format!("http://{}/", addr)).unwrap()
}

async fn respond(mut socket: TcpStream, routes: &HashMap<String, Route>) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&request);
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    match routes.get(&path).cloned().unwrap_or(Route::Status(404)) {
        Route::Body(body) => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await?;
            socket.write_all(&body).await?;
        }
        Route::Status(code) => {
            let head = format!(
                "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            );
            socket.write_all(head.as_bytes()).await?;
        }
        Route::Stall => {
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\nConnection: close\r\n\r\n")
                .await?;
            socket.write_all(&[0u8; 16]).await?;
            socket.flush().await?;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
    socket.shutdown().await
}

/// CBBC export text: UTF-16LE with BOM, tab separated.
pub fn cbbc_text(header: &[&str], rows: &[Vec<String>]) -> Vec<u8> {
    let mut text = header.join("\t");
    text.push_str("\r\n");
    for row in rows {
        text.push_str(&row.join("\t"));
        text.push_str("\r\n");
    }

    let mut encoded = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        encoded.extend_from_slice(&unit.to_le_bytes());
    }
    encoded
}

/// A CBBC-style export as downloaded: the text above, deflated into a zip.
pub fn cbbc_zip(entry_name: &str, header: &[&str], rows: &[Vec<String>]) -> Vec<u8> {
    let encoded = cbbc_text(header, rows);
    let mut out = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut out));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(entry_name, options).unwrap();
        zip.write_all(&encoded).unwrap();
        zip.finish().unwrap();
    }
    out
}

pub const CBBC_HEADER: &[&str] = &[
    "CBBC Code",
    "CBBC Name",
    "Trade Date",
    "No. of CBBC still out in market *",
    "% of issue still out in market",
    "Turnover",
    "Volume",
    "Ent. Ratio^",
    "Underlying",
    "Issuer",
];

/// `kept` well-formed rows plus `junk` footer rows without a numeric code.
pub fn cbbc_rows(kept: usize, junk: usize) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(kept + junk);
    for i in 0..kept {
        let (underlying, issuer) = if i % 2 == 0 { ("HSI", "BI") } else { ("HSCEI", "UB") };
        rows.push(vec![
            format!("{:05}", 60000 + i),
            format!("{}#{}RC2012A", issuer, underlying),
            format!("2024-01-{:02}", 2 + i % 3),
            "1,000".to_string(),
            "12.5".to_string(),
            "150,000".to_string(),
            "10,000".to_string(),
            "10000".to_string(),
            underlying.to_string(),
            issuer.to_string(),
        ]);
    }
    for i in 0..junk {
        let mut row = vec![String::new(); CBBC_HEADER.len()];
        row[0] = format!("Remark {}", ["*", "^", "#"][i % 3]);
        rows.push(row);
    }
    rows
}
