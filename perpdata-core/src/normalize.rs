//! Series normalization: raw archive records into typed rows.
//!
//! Field names are assigned at the decode boundary — nothing downstream
//! touches positional columns. Rows whose timestamp field fails numeric
//! coercion (stray header rows mixed into provider CSVs) are dropped.

use crate::fetch::RawBatch;
use chrono::{DateTime, Utc};

/// One primary OHLCV minute bar with taker-side volume split.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineRow {
    /// Bar open time, epoch milliseconds UTC.
    pub ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub num_trades: i64,
    pub taker_buy_base_vol: f64,
    pub taker_buy_quote_vol: f64,
    /// Derived: `volume - taker_buy_base_vol`.
    pub taker_sell_base_vol: f64,
    /// Derived: `quote_volume - taker_buy_quote_vol`.
    pub taker_sell_quote_vol: f64,
}

/// Mark-price or index-price minute bar: timestamp plus four OHLC fields.
/// Provider placeholder columns are discarded at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteKlineRow {
    pub ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One funding-rate settlement event (8-hour cadence).
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRow {
    pub ts_ms: i64,
    pub rate: f64,
}

/// One open-interest snapshot from the live endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenInterestRow {
    pub ts_ms: i64,
    pub open_interest: f64,
}

/// Epoch-ms to UTC instant; `None` for out-of-range values.
pub fn utc_from_ms(ts_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts_ms)
}

/// Kline archive layout (headerless): open_time, open, high, low, close,
/// volume, close_time, quote_volume, num_trades, taker_buy_base_vol,
/// taker_buy_quote_vol, ignore.
pub fn normalize_klines(batches: &[RawBatch]) -> Vec<KlineRow> {
    batches
        .iter()
        .flat_map(|b| b.records.iter())
        .filter_map(|rec| kline_row(rec))
        .collect()
}

fn kline_row(rec: &[String]) -> Option<KlineRow> {
    let ts_ms = parse_i64(rec, 0)?;
    let open = parse_f64(rec, 1)?;
    let high = parse_f64(rec, 2)?;
    let low = parse_f64(rec, 3)?;
    let close = parse_f64(rec, 4)?;
    let volume = parse_f64(rec, 5)?;
    // index 6 is close_time, discarded
    let quote_volume = parse_f64(rec, 7)?;
    let num_trades = parse_i64(rec, 8)?;
    let taker_buy_base_vol = parse_f64(rec, 9)?;
    let taker_buy_quote_vol = parse_f64(rec, 10)?;

    Some(KlineRow {
        ts_ms,
        open,
        high,
        low,
        close,
        volume,
        quote_volume,
        num_trades,
        taker_buy_base_vol,
        taker_buy_quote_vol,
        taker_sell_base_vol: volume - taker_buy_base_vol,
        taker_sell_quote_vol: quote_volume - taker_buy_quote_vol,
    })
}

/// Mark/index archive layout (headerless): open_time, open, high, low,
/// close, then placeholder columns we discard.
pub fn normalize_quote_klines(batches: &[RawBatch]) -> Vec<QuoteKlineRow> {
    batches
        .iter()
        .flat_map(|b| b.records.iter())
        .filter_map(|rec| {
            Some(QuoteKlineRow {
                ts_ms: parse_i64(rec, 0)?,
                open: parse_f64(rec, 1)?,
                high: parse_f64(rec, 2)?,
                low: parse_f64(rec, 3)?,
                close: parse_f64(rec, 4)?,
            })
        })
        .collect()
}

/// Funding archives carry a header; fields are resolved by name.
pub fn normalize_funding(batches: &[RawBatch]) -> Vec<FundingRow> {
    let mut rows = Vec::new();
    for batch in batches {
        let Some(header) = &batch.header else {
            continue;
        };
        let Some(ts_idx) = header.iter().position(|h| h == "fundingTime") else {
            continue;
        };
        let Some(rate_idx) = header.iter().position(|h| h == "fundingRate") else {
            continue;
        };
        rows.extend(batch.records.iter().filter_map(|rec| {
            Some(FundingRow {
                ts_ms: parse_i64(rec, ts_idx)?,
                rate: parse_f64(rec, rate_idx)?,
            })
        }));
    }
    rows
}

fn parse_i64(rec: &[String], idx: usize) -> Option<i64> {
    rec.get(idx)?.trim().parse().ok()
}

fn parse_f64(rec: &[String], idx: usize) -> Option<f64> {
    rec.get(idx)?.trim().parse().ok()
}
