//! Open-interest poller.
//!
//! The archive endpoint does not publish open interest, so recent snapshots
//! come from the live REST endpoint, paginated by advancing `startTime` to
//! one minute past the last returned snapshot. Polling is best-effort: a
//! transport or decode failure ends it early with the partial result.

use crate::normalize::OpenInterestRow;
use crate::source::{ArchiveTransport, DataError, FetchProgress};
use serde::Deserialize;

pub const OPEN_INTEREST_URL: &str = "https://fapi.binance.com/futures/data/openInterestHist";
pub const PAGE_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct OpenInterestSnapshot {
    timestamp: i64,
    #[serde(rename = "sumOpenInterest")]
    sum_open_interest: String,
}

pub struct OpenInterestPoller<'a> {
    transport: &'a dyn ArchiveTransport,
}

impl<'a> OpenInterestPoller<'a> {
    pub fn new(transport: &'a dyn ArchiveTransport) -> Self {
        Self { transport }
    }

    /// Collect snapshots until the endpoint returns a short or empty page.
    pub fn poll(
        &self,
        symbol: &str,
        progress: &dyn FetchProgress,
    ) -> Result<Vec<OpenInterestRow>, DataError> {
        let mut rows = Vec::new();
        let mut start_time: Option<i64> = None;

        loop {
            let url = page_url(symbol, start_time);
            let resp = match self.transport.get(&url) {
                Ok(resp) => resp,
                Err(e) => {
                    progress.on_warning(&format!("open interest polling stopped early: {e}"));
                    break;
                }
            };
            if !resp.is_success() {
                progress.on_warning(&format!(
                    "open interest polling stopped early: HTTP {}",
                    resp.status
                ));
                break;
            }

            let page: Vec<OpenInterestSnapshot> = match serde_json::from_slice(&resp.body) {
                Ok(page) => page,
                Err(e) => {
                    progress.on_warning(&format!("open interest page decode failed: {e}"));
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            let short_page = page.len() < PAGE_LIMIT;
            let last_ts = page.last().map(|s| s.timestamp);
            rows.extend(page.into_iter().filter_map(|s| {
                let open_interest = s.sum_open_interest.trim().parse().ok()?;
                Some(OpenInterestRow {
                    ts_ms: s.timestamp,
                    open_interest,
                })
            }));

            if short_page {
                break;
            }
            // Next page starts one minute after the last snapshot.
            start_time = last_ts.map(|ts| ts + 60_000);
        }

        Ok(rows)
    }
}

fn page_url(symbol: &str, start_time: Option<i64>) -> String {
    let mut url = format!("{OPEN_INTEREST_URL}?symbol={symbol}&period=1m&limit={PAGE_LIMIT}");
    if let Some(ts) = start_time {
        url.push_str(&format!("&startTime={ts}"));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{HttpResponse, SilentProgress};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn page_json(start_ts: i64, count: usize) -> Vec<u8> {
        let entries: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"symbol":"ETHUSDT","timestamp":{},"sumOpenInterest":"{}.5","sumOpenInterestValue":"0"}}"#,
                    start_ts + i as i64 * 60_000,
                    1000 + i
                )
            })
            .collect();
        format!("[{}]", entries.join(",")).into_bytes()
    }

    struct PagedTransport {
        pages: Mutex<Vec<Result<HttpResponse, DataError>>>,
        calls: AtomicUsize,
        seen_urls: Mutex<Vec<String>>,
    }

    impl PagedTransport {
        fn new(pages: Vec<Result<HttpResponse, DataError>>) -> Self {
            let mut pages = pages;
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
                calls: AtomicUsize::new(0),
                seen_urls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ArchiveTransport for PagedTransport {
        fn get(&self, url: &str) -> Result<HttpResponse, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_urls.lock().unwrap().push(url.to_string());
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(DataError::Network("no more pages scripted".into())))
        }
    }

    fn ok(body: Vec<u8>) -> Result<HttpResponse, DataError> {
        Ok(HttpResponse { status: 200, body })
    }

    #[test]
    fn stops_after_short_page_with_total_row_count() {
        let t0 = 1_704_067_200_000;
        let transport = PagedTransport::new(vec![
            ok(page_json(t0, 500)),
            ok(page_json(t0 + 500 * 60_000, 500)),
            ok(page_json(t0 + 1000 * 60_000, 200)),
        ]);
        let poller = OpenInterestPoller::new(&transport);

        let rows = poller.poll("ETHUSDT", &SilentProgress).unwrap();
        assert_eq!(rows.len(), 1200);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        // Cursor advances one minute past the last snapshot of each full page.
        let urls = transport.seen_urls.lock().unwrap();
        assert!(!urls[0].contains("startTime"));
        assert!(urls[1].contains(&format!("startTime={}", t0 + 500 * 60_000)));
        assert!(urls[2].contains(&format!("startTime={}", t0 + 1000 * 60_000)));
    }

    #[test]
    fn empty_first_page_yields_no_rows() {
        let transport = PagedTransport::new(vec![ok(b"[]".to_vec())]);
        let poller = OpenInterestPoller::new(&transport);

        let rows = poller.poll("ETHUSDT", &SilentProgress).unwrap();
        assert!(rows.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transport_error_keeps_partial_result() {
        let t0 = 1_704_067_200_000;
        let transport = PagedTransport::new(vec![
            ok(page_json(t0, 500)),
            Err(DataError::Network("connection reset".into())),
        ]);
        let poller = OpenInterestPoller::new(&transport);

        let rows = poller.poll("ETHUSDT", &SilentProgress).unwrap();
        assert_eq!(rows.len(), 500);
    }

    #[test]
    fn snapshot_values_are_parsed_from_decimal_strings() {
        let transport = PagedTransport::new(vec![ok(
            br#"[{"symbol":"ETHUSDT","timestamp":1704067200000,"sumOpenInterest":"123456.789","sumOpenInterestValue":"0"}]"#.to_vec(),
        )]);
        let poller = OpenInterestPoller::new(&transport);

        let rows = poller.poll("ETHUSDT", &SilentProgress).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ts_ms, 1_704_067_200_000);
        assert!((rows[0].open_interest - 123_456.789).abs() < 1e-9);
    }
}
