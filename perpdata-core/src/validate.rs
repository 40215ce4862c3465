//! Table validation: nulls, duplicate keys, gap anomalies, OHLC consistency.
//!
//! Only deduplication changes the table. Gap and OHLC findings are reported,
//! never repaired; strict handling is the caller's decision.

use crate::source::DataError;
use polars::prelude::*;

/// Expected cadence between rows; gaps above twice this are anomalous.
const EXPECTED_CADENCE_MS: i64 = 60_000;
const GAP_THRESHOLD_MS: i64 = 2 * EXPECTED_CADENCE_MS;

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub total_rows: usize,
    /// Per-column null fraction, in table column order.
    pub null_fractions: Vec<(String, f64)>,
    pub duplicates_removed: usize,
    /// Largest consecutive timestamp delta, in seconds.
    pub max_gap_secs: Option<i64>,
    /// Count of consecutive deltas above 120 seconds.
    pub gaps_over_threshold: usize,
    /// Rows violating `high >= max(open, close, low)` or
    /// `low <= min(open, close, high)`.
    pub ohlc_violations: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates_removed == 0 && self.ohlc_violations == 0
    }
}

/// Sort by `timestamp_utc`, drop duplicate keys (first occurrence wins),
/// and report findings. Running it again on its own output removes nothing.
pub fn validate(df: DataFrame) -> Result<(DataFrame, ValidationReport), DataError> {
    let before = df.height();

    let sorted = df
        .lazy()
        .sort(
            ["timestamp_utc"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .unique_stable(Some(vec!["timestamp_utc".into()]), UniqueKeepStrategy::First)
        .collect()?;

    let total_rows = sorted.height();
    let duplicates_removed = before - total_rows;

    let null_fractions = sorted
        .get_columns()
        .iter()
        .map(|c| {
            let frac = if total_rows == 0 {
                0.0
            } else {
                c.null_count() as f64 / total_rows as f64
            };
            (c.name().to_string(), frac)
        })
        .collect();

    let ts: Vec<i64> = sorted
        .column("timestamp_utc")?
        .cast(&DataType::Int64)?
        .i64()?
        .into_no_null_iter()
        .collect();
    let mut max_gap_ms: Option<i64> = None;
    let mut gaps_over_threshold = 0;
    for pair in ts.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > GAP_THRESHOLD_MS {
            gaps_over_threshold += 1;
        }
        max_gap_ms = Some(max_gap_ms.map_or(delta, |m| m.max(delta)));
    }

    let ohlc_violations = sorted
        .clone()
        .lazy()
        .filter(
            col("high")
                .lt(col("low"))
                .or(col("high").lt(col("open")))
                .or(col("high").lt(col("close")))
                .or(col("low").gt(col("open")))
                .or(col("low").gt(col("close"))),
        )
        .collect()?
        .height();

    let report = ValidationReport {
        total_rows,
        null_fractions,
        duplicates_removed,
        max_gap_secs: max_gap_ms.map(|ms| ms / 1000),
        gaps_over_threshold,
        ohlc_violations,
    };

    Ok((sorted, report))
}
