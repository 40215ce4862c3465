//! Monthly archive fetcher.
//!
//! Enumerates one Binance Vision URL per (year, month), downloads them on a
//! bounded worker pool, and decodes each zip container into raw CSV record
//! batches. Fetching is partial-tolerant: a 404 means the month is not
//! published yet, and a URL that exhausts its retries is logged and skipped.
//! Completion order is arbitrary — the merger re-sorts by timestamp.

use crate::config::PipelineConfig;
use crate::source::{ArchiveTransport, DataError, FetchProgress};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const ARCHIVE_BASE_URL: &str = "https://data.binance.vision/data/futures/um/monthly";

/// One logical archive series on the distribution endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Kline,
    MarkPrice,
    IndexPrice,
    FundingRate,
}

impl SeriesKind {
    /// Path segment under `futures/um/monthly/`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            SeriesKind::Kline => "klines",
            SeriesKind::MarkPrice => "markPriceKlines",
            SeriesKind::IndexPrice => "indexPriceKlines",
            SeriesKind::FundingRate => "fundingRate",
        }
    }

    /// Funding archives carry a header row; the kline families do not.
    pub fn has_header(&self) -> bool {
        matches!(self, SeriesKind::FundingRate)
    }

    /// Funding archives have no timeframe segment in path or filename.
    pub fn uses_timeframe(&self) -> bool {
        !matches!(self, SeriesKind::FundingRate)
    }

    /// Monthly archive URL for this series.
    pub fn archive_url(&self, symbol: &str, timeframe: &str, year: i32, month: u32) -> String {
        let segment = self.path_segment();
        if self.uses_timeframe() {
            format!(
                "{ARCHIVE_BASE_URL}/{segment}/{symbol}/{timeframe}/{symbol}-{timeframe}-{year:04}-{month:02}.zip"
            )
        } else {
            format!(
                "{ARCHIVE_BASE_URL}/{segment}/{symbol}/{symbol}-{segment}-{year:04}-{month:02}.zip"
            )
        }
    }
}

/// The decoded record set of one inner CSV file from a monthly archive.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    /// Column names for header-bearing series kinds.
    pub header: Option<Vec<String>>,
    /// String fields, one Vec per CSV row.
    pub records: Vec<Vec<String>>,
}

/// All (year, month) pairs covering `[start, end]` inclusive.
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

/// Downloads and decodes one archive series over the configured date range.
pub struct ArchiveFetcher<'a> {
    transport: &'a dyn ArchiveTransport,
    config: &'a PipelineConfig,
}

impl<'a> ArchiveFetcher<'a> {
    pub fn new(transport: &'a dyn ArchiveTransport, config: &'a PipelineConfig) -> Self {
        Self { transport, config }
    }

    /// Fetch every monthly archive for `kind`, in parallel.
    ///
    /// Returns the decoded batches in arbitrary completion order. Only pool
    /// construction can fail here; individual URLs degrade to warnings.
    pub fn fetch(
        &self,
        kind: SeriesKind,
        progress: &dyn FetchProgress,
    ) -> Result<Vec<RawBatch>, DataError> {
        let urls: Vec<String> = month_range(self.config.start, self.config.end)
            .into_iter()
            .map(|(y, m)| kind.archive_url(&self.config.symbol, &self.config.timeframe, y, m))
            .collect();
        progress.on_series_start(kind.path_segment(), urls.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
            .map_err(|e| DataError::Config(format!("worker pool: {e}")))?;

        let completed = AtomicUsize::new(0);
        let per_url: Vec<Vec<RawBatch>> = pool.install(|| {
            urls.par_iter()
                .map(|url| {
                    let batches = match self.download_archive(url, kind) {
                        Ok(Some(batches)) => batches,
                        // Month not yet published
                        Ok(None) => Vec::new(),
                        Err(e) => {
                            progress.on_warning(&format!("skipping {url}: {e}"));
                            Vec::new()
                        }
                    };
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    progress.on_url_done(kind.path_segment(), done, urls.len());
                    batches
                })
                .collect()
        });

        let batches: Vec<RawBatch> = per_url.into_iter().flatten().collect();
        progress.on_series_done(kind.path_segment(), batches.len());
        Ok(batches)
    }

    fn download_archive(
        &self,
        url: &str,
        kind: SeriesKind,
    ) -> Result<Option<Vec<RawBatch>>, DataError> {
        match self.download_with_retry(url)? {
            Some(body) => Ok(Some(decode_archive(&body, kind.has_header())?)),
            None => Ok(None),
        }
    }

    /// One URL, up to `retry_attempts` tries.
    ///
    /// Rate-limit-style statuses back off 0.5s/1.0s/1.5s between attempts;
    /// transport errors back off 1s/2s/3s. A 404 short-circuits to `None`.
    fn download_with_retry(&self, url: &str) -> Result<Option<Vec<u8>>, DataError> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let wait = match self.transport.get(url) {
                Ok(resp) if resp.is_success() => return Ok(Some(resp.body)),
                Ok(resp) if resp.is_not_found() => return Ok(None),
                Ok(resp) => {
                    last_error = Some(DataError::HttpStatus {
                        status: resp.status,
                        url: url.to_string(),
                    });
                    Duration::from_millis(500 * (attempt as u64 + 1))
                }
                Err(e) => {
                    last_error = Some(e);
                    Duration::from_millis(1000 * (attempt as u64 + 1))
                }
            };
            if attempt + 1 < attempts {
                std::thread::sleep(wait);
            }
        }

        Err(last_error
            .unwrap_or_else(|| DataError::Network(format!("retries exhausted for {url}"))))
    }
}

/// Decode a zip container into one RawBatch per inner CSV file.
fn decode_archive(body: &[u8], has_header: bool) -> Result<Vec<RawBatch>, DataError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body))?;
    let mut batches = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut inner = archive.by_index(i)?;
        let mut text = String::new();
        inner.read_to_string(&mut text)?;
        batches.push(decode_csv(&text, has_header)?);
    }
    Ok(batches)
}

fn decode_csv(text: &str, has_header: bool) -> Result<RawBatch, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header = if has_header {
        Some(reader.headers()?.iter().map(str::to_string).collect())
    } else {
        None
    };

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawBatch { header, records })
}
