//! PerpData Core — minute-grid dataset builder for perpetual-futures
//! instruments.
//!
//! The pipeline downloads monthly kline, mark-price, index-price, and
//! funding-rate archives from the Binance Vision endpoint, polls the live
//! open-interest endpoint, normalizes everything to a canonical
//! `timestamp_utc` key, left-joins into one wide table, validates it, and
//! exports Parquet + CSV + a JSON run summary.

pub mod config;
pub mod export;
pub mod fetch;
pub mod merge;
pub mod normalize;
pub mod open_interest;
pub mod pipeline;
pub mod source;
pub mod validate;

pub use config::PipelineConfig;
pub use export::ExportSummary;
pub use pipeline::{run, RunReport};
pub use source::{
    ArchiveTransport, DataError, FetchProgress, HttpTransport, SilentProgress, StdoutProgress,
};
pub use validate::ValidationReport;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types shared across the worker pool and any
    /// embedding thread are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PipelineConfig>();
        require_sync::<PipelineConfig>();
        require_send::<normalize::KlineRow>();
        require_sync::<normalize::KlineRow>();
        require_send::<fetch::RawBatch>();
        require_sync::<fetch::RawBatch>();
        require_send::<HttpTransport>();
        require_sync::<HttpTransport>();
        require_send::<DataError>();
        require_sync::<DataError>();
    }
}
