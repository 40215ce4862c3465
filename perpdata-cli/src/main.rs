//! PerpData CLI — build and inspect perpetual-futures minute datasets.
//!
//! Commands:
//! - `build` — download all series, merge, validate, and export
//! - `summary` — print the run summary of an existing output directory

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use perpdata_core::{
    pipeline, ExportSummary, HttpTransport, PipelineConfig, RunReport, StdoutProgress,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "perpdata", about = "Perpetual-futures minute dataset builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download all series, merge, validate, and export Parquet + CSV.
    Build {
        /// TOML config file; flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instrument symbol, e.g. ETHUSDT.
        #[arg(long)]
        symbol: Option<String>,

        /// First month to request (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Last month to request (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Output directory for the Parquet/CSV/summary files.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Width of the download worker pool.
        #[arg(long)]
        workers: Option<usize>,

        /// Fail the run on duplicate timestamps or OHLC violations.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Print the run summary of an existing output directory.
    Summary {
        /// Output directory of a previous build.
        #[arg(long, default_value = "eth_perp_1m_dataset")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            symbol,
            start,
            end,
            out_dir,
            workers,
            strict,
        } => run_build(config, symbol, start, end, out_dir, workers, strict),
        Commands::Summary { out_dir } => run_summary(&out_dir),
    }
}

fn run_build(
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    start: Option<String>,
    end: Option<String>,
    out_dir: Option<PathBuf>,
    workers: Option<usize>,
    strict: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(&path)?,
        None => PipelineConfig::default(),
    };

    if let Some(symbol) = symbol {
        config.symbol = symbol;
    }
    if let Some(start) = start {
        config.start = NaiveDate::parse_from_str(&start, "%Y-%m-%d")
            .context("--start must be YYYY-MM-DD")?;
    }
    if let Some(end) = end {
        config.end =
            NaiveDate::parse_from_str(&end, "%Y-%m-%d").context("--end must be YYYY-MM-DD")?;
    }
    if let Some(out_dir) = out_dir {
        config.out_dir = out_dir;
    }
    if let Some(workers) = workers {
        config.max_workers = workers;
    }
    if strict {
        config.strict = true;
    }

    let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs));
    let report = pipeline::run(&config, &transport, &StdoutProgress)?;
    print_report(&config, &report);

    Ok(())
}

fn run_summary(out_dir: &PathBuf) -> Result<()> {
    let path = out_dir.join("dataset_summary.json");
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("no run summary at {}", path.display()))?;
    let summary: ExportSummary = serde_json::from_str(&content)?;

    println!("Dataset: {}", out_dir.display());
    println!("Rows:       {}", summary.total_rows);
    println!("Date range: {}", summary.date_range);
    println!("Size:       {:.2} MB", summary.file_size_mb);
    println!("Columns ({}):", summary.columns.len());
    for col in &summary.columns {
        println!("  - {col}");
    }

    Ok(())
}

fn print_report(config: &PipelineConfig, report: &RunReport) {
    println!();
    println!("=== Dataset Build Complete ===");
    println!("Symbol:         {}", config.symbol);
    println!("File:           {}", config.parquet_path().display());
    println!("Total rows:     {}", report.summary.total_rows);
    println!("Date range:     {}", report.summary.date_range);
    println!("File size:      {:.2} MB", report.summary.file_size_mb);
    println!();
    println!("--- Series ---");
    println!("Klines:         {}", report.kline_rows);
    println!("Mark price:     {}", report.mark_rows);
    println!("Index price:    {}", report.index_rows);
    println!("Funding events: {}", report.funding_rows);
    println!("Open interest:  {}", report.open_interest_rows);
    println!();
    println!("--- Validation ---");
    println!("Duplicates removed: {}", report.validation.duplicates_removed);
    if let Some(max_gap) = report.validation.max_gap_secs {
        println!("Max time gap:       {:.1} min", max_gap as f64 / 60.0);
    }
    println!("Gaps > 2 min:       {}", report.validation.gaps_over_threshold);
    if report.validation.ohlc_violations > 0 {
        println!(
            "WARNING: {} row(s) with invalid OHLC relationships",
            report.validation.ohlc_violations
        );
    }
    println!();
    println!("--- Null fractions ---");
    for (name, frac) in &report.validation.null_fractions {
        println!("  {name:<22} {:>6.2}% null", frac * 100.0);
    }
}
