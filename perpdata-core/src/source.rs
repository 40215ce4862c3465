//! Transport seam, structured error types, and progress reporting.
//!
//! The ArchiveTransport trait abstracts over the HTTP layer so the fetcher
//! and the open-interest poller can run against an in-memory mock in tests.

use std::io::Write;
use std::time::Duration;
use thiserror::Error;

/// Structured error types for the dataset pipeline.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("archive decode error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("csv decode error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot decode error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("frame error: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("primary kline series is empty for '{symbol}' — nothing to build")]
    EmptyPrimarySeries { symbol: String },

    #[error("strict validation failed: {0}")]
    StrictValidation(String),
}

/// A raw HTTP response: status code plus body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Trait for the HTTP layer under the fetcher and poller.
///
/// Retry and pagination policy live above this trait — implementations
/// issue exactly one request per call.
pub trait ArchiveTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, DataError>;
}

/// Blocking reqwest transport with a fixed per-request timeout.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }
}

impl ArchiveTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, DataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| DataError::Network(e.to_string()))?
            .to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// Progress callback for multi-file downloads.
///
/// Completion order within a series is arbitrary (the worker pool reports
/// as archives finish), so callbacks only receive counts.
pub trait FetchProgress: Send + Sync {
    /// Called with the total URL count before a series starts downloading.
    fn on_series_start(&self, series: &str, total: usize);

    /// Called each time one archive finishes (successfully or skipped).
    fn on_url_done(&self, series: &str, completed: usize, total: usize);

    /// Called when a whole series is done, with the decoded batch count.
    fn on_series_done(&self, series: &str, batches: usize);

    /// Called for skipped files and early poller termination.
    fn on_warning(&self, message: &str);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_series_start(&self, series: &str, total: usize) {
        println!("Downloading {series}: {total} files...");
    }

    fn on_url_done(&self, series: &str, completed: usize, total: usize) {
        print!("\r  {series}: {completed}/{total}");
        let _ = std::io::stdout().flush();
    }

    fn on_series_done(&self, series: &str, batches: usize) {
        println!("\r  {series}: {batches} archive(s) decoded");
    }

    fn on_warning(&self, message: &str) {
        eprintln!("WARNING: {message}");
    }
}

/// No-op progress reporter for tests and library embedding.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_series_start(&self, _series: &str, _total: usize) {}
    fn on_url_done(&self, _series: &str, _completed: usize, _total: usize) {}
    fn on_series_done(&self, _series: &str, _batches: usize) {}
    fn on_warning(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_range() {
        let ok = HttpResponse {
            status: 200,
            body: vec![],
        };
        assert!(ok.is_success());

        let missing = HttpResponse {
            status: 404,
            body: vec![],
        };
        assert!(!missing.is_success());
        assert!(missing.is_not_found());

        let throttled = HttpResponse {
            status: 429,
            body: vec![],
        };
        assert!(!throttled.is_success());
        assert!(!throttled.is_not_found());
    }
}
