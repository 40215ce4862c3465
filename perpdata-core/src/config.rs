//! Pipeline configuration.
//!
//! One explicit struct replaces scattered constants: every component takes
//! the parts it needs at construction. Loadable from TOML, overridable by
//! CLI flags.

use crate::source::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Earliest month Binance publishes USDT-margined futures archives for.
pub const ARCHIVE_FLOOR: (i32, u32, u32) = (2019, 9, 1);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Instrument symbol, e.g. ETHUSDT.
    pub symbol: String,

    /// Kline interval path segment, e.g. "1m".
    #[serde(default = "default_timeframe")]
    pub timeframe: String,

    /// Output directory for the Parquet/CSV/summary files.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Width of the download worker pool.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Attempts per archive URL before it is skipped.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// First month to request (inclusive).
    #[serde(default = "default_start")]
    pub start: NaiveDate,

    /// Last month to request (inclusive).
    #[serde(default = "default_end")]
    pub end: NaiveDate,

    /// When set, duplicate timestamps or OHLC violations fail the run
    /// instead of being reported and continued past.
    #[serde(default)]
    pub strict: bool,
}

fn default_timeframe() -> String {
    "1m".to_string()
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("eth_perp_1m_dataset")
}

fn default_max_workers() -> usize {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_start() -> NaiveDate {
    let (y, m, d) = ARCHIVE_FLOOR;
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn default_end() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbol: "ETHUSDT".to_string(),
            timeframe: default_timeframe(),
            out_dir: default_out_dir(),
            max_workers: default_max_workers(),
            retry_attempts: default_retry_attempts(),
            timeout_secs: default_timeout_secs(),
            start: default_start(),
            end: default_end(),
            strict: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content).map_err(|e| DataError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Master Parquet output path, e.g. `out/ETHUSDT_perp_1m_master.parquet`.
    pub fn parquet_path(&self) -> PathBuf {
        self.out_dir
            .join(format!("{}_perp_{}_master.parquet", self.symbol, self.timeframe))
    }

    /// CSV sibling of the Parquet file.
    pub fn csv_path(&self) -> PathBuf {
        self.out_dir
            .join(format!("{}_perp_{}_master.csv", self.symbol, self.timeframe))
    }

    /// Run summary path.
    pub fn summary_path(&self) -> PathBuf {
        self.out_dir.join("dataset_summary.json")
    }
}
