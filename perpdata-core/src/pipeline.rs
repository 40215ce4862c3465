//! End-to-end pipeline orchestration.
//!
//! Fetch and normalize the four archive series, poll open interest, merge,
//! validate, export. The only fatal condition is an empty primary kline
//! series; every secondary series degrades to all-null columns.

use crate::config::PipelineConfig;
use crate::export::{self, ExportSummary};
use crate::fetch::{ArchiveFetcher, SeriesKind};
use crate::merge;
use crate::normalize;
use crate::open_interest::OpenInterestPoller;
use crate::source::{ArchiveTransport, DataError, FetchProgress};
use crate::validate::{self, ValidationReport};

/// Everything a caller needs to report on a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub kline_rows: usize,
    pub mark_rows: usize,
    pub index_rows: usize,
    pub funding_rows: usize,
    pub open_interest_rows: usize,
    pub validation: ValidationReport,
    pub summary: ExportSummary,
}

pub fn run(
    config: &PipelineConfig,
    transport: &dyn ArchiveTransport,
    progress: &dyn FetchProgress,
) -> Result<RunReport, DataError> {
    let fetcher = ArchiveFetcher::new(transport, config);

    let klines = normalize::normalize_klines(&fetcher.fetch(SeriesKind::Kline, progress)?);
    if klines.is_empty() {
        return Err(DataError::EmptyPrimarySeries {
            symbol: config.symbol.clone(),
        });
    }

    let mark = normalize::normalize_quote_klines(&fetcher.fetch(SeriesKind::MarkPrice, progress)?);
    let index =
        normalize::normalize_quote_klines(&fetcher.fetch(SeriesKind::IndexPrice, progress)?);
    let funding = normalize::normalize_funding(&fetcher.fetch(SeriesKind::FundingRate, progress)?);
    let open_interest = OpenInterestPoller::new(transport).poll(&config.symbol, progress)?;

    let merged = merge::merge(
        merge::klines_to_frame(&klines)?,
        merge::quote_klines_to_frame(&mark, "mark")?,
        merge::quote_klines_to_frame(&index, "index")?,
        merge::funding_to_frame(&funding)?,
        merge::open_interest_to_frame(&open_interest)?,
    )?;

    let (table, validation) = validate::validate(merged)?;
    if config.strict && !validation.is_clean() {
        return Err(DataError::StrictValidation(format!(
            "{} duplicate timestamp(s) removed, {} OHLC violation(s)",
            validation.duplicates_removed, validation.ohlc_violations
        )));
    }

    let summary = export::export(&table, config)?;

    Ok(RunReport {
        kline_rows: klines.len(),
        mark_rows: mark.len(),
        index_rows: index.len(),
        funding_rows: funding.len(),
        open_interest_rows: open_interest.len(),
        validation,
        summary,
    })
}
