//! Persist the merged table: snappy Parquet, CSV sibling, JSON run summary.
//!
//! The Parquet write goes through a `.tmp` rename so a crash mid-write never
//! leaves a half-valid master file. There is no resumability beyond that —
//! a failed run is re-run from scratch.

use crate::config::PipelineConfig;
use crate::source::DataError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportSummary {
    pub total_rows: usize,
    /// `"<min> to <max>"` over `timestamp_utc`.
    pub date_range: String,
    pub columns: Vec<String>,
    pub file_size_mb: f64,
}

pub fn export(df: &DataFrame, config: &PipelineConfig) -> Result<ExportSummary, DataError> {
    fs::create_dir_all(&config.out_dir)?;

    let parquet_path = config.parquet_path();
    let tmp_path = parquet_path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df.clone())?;
    if let Err(e) = fs::rename(&tmp_path, &parquet_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    let csv_file = fs::File::create(config.csv_path())?;
    CsvWriter::new(csv_file)
        .include_header(true)
        .finish(&mut df.clone())?;

    let file_size = fs::metadata(&parquet_path)?.len();
    let summary = ExportSummary {
        total_rows: df.height(),
        date_range: date_range(df)?,
        columns: df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
        file_size_mb: file_size as f64 / (1024.0 * 1024.0),
    };

    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(config.summary_path(), json)?;

    Ok(summary)
}

fn date_range(df: &DataFrame) -> Result<String, DataError> {
    let ts = df.column("timestamp_utc")?.cast(&DataType::Int64)?;
    let ca = ts.i64()?;
    match (ca.min(), ca.max()) {
        (Some(min), Some(max)) => Ok(format!("{} to {}", format_ms(min), format_ms(max))),
        _ => Ok("empty".to_string()),
    }
}

fn format_ms(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_out_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir =
            std::env::temp_dir().join(format!("perpdata_export_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sample_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                "timestamp_utc".into(),
                vec![1_704_067_200_000i64, 1_704_067_260_000],
            )
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap(),
            Column::new("open".into(), vec![100.0, 101.0]),
            Column::new("close".into(), vec![100.5, 101.5]),
        ])
        .unwrap()
    }

    #[test]
    fn export_writes_parquet_csv_and_summary() {
        let out_dir = temp_out_dir();
        let config = PipelineConfig {
            out_dir: out_dir.clone(),
            ..PipelineConfig::default()
        };

        let summary = export(&sample_frame(), &config).unwrap();

        assert!(config.parquet_path().exists());
        assert!(config.csv_path().exists());
        assert!(config.summary_path().exists());
        assert!(!config.parquet_path().with_extension("parquet.tmp").exists());

        assert_eq!(summary.total_rows, 2);
        assert_eq!(
            summary.date_range,
            "2024-01-01 00:00:00 UTC to 2024-01-01 00:01:00 UTC"
        );
        assert_eq!(
            summary.columns,
            vec!["timestamp_utc", "open", "close"]
        );
        assert!(summary.file_size_mb > 0.0);

        let _ = fs::remove_dir_all(&out_dir);
    }

    #[test]
    fn summary_json_roundtrips() {
        let out_dir = temp_out_dir();
        let config = PipelineConfig {
            out_dir: out_dir.clone(),
            ..PipelineConfig::default()
        };

        let written = export(&sample_frame(), &config).unwrap();
        let content = fs::read_to_string(config.summary_path()).unwrap();
        let parsed: ExportSummary = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, written);

        let _ = fs::remove_dir_all(&out_dir);
    }

    #[test]
    fn parquet_roundtrips_through_reader() {
        let out_dir = temp_out_dir();
        let config = PipelineConfig {
            out_dir: out_dir.clone(),
            ..PipelineConfig::default()
        };

        export(&sample_frame(), &config).unwrap();

        let file = fs::File::open(config.parquet_path()).unwrap();
        let read_back = ParquetReader::new(file).finish().unwrap();
        assert_eq!(read_back.height(), 2);
        assert_eq!(read_back.width(), 3);

        let _ = fs::remove_dir_all(&out_dir);
    }
}
