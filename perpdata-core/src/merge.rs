//! Merge typed series into one wide minute-grid table.
//!
//! The primary kline frame is the spine; each secondary series is
//! left-joined on exact `timestamp_utc` equality in a fixed order (mark,
//! index, funding, open interest). After joining, only `funding_rate` is
//! forward-filled — it is a step function between 8-hour settlement events.
//! Mark/index/open-interest keep nulls where no matching minute exists.

use crate::normalize::{FundingRow, KlineRow, OpenInterestRow, QuoteKlineRow};
use crate::source::DataError;
use polars::prelude::*;

fn ts_column(ts_ms: Vec<i64>) -> Result<Column, DataError> {
    // Epoch-ms inputs are UTC by construction; the column stays naive.
    Ok(Column::new("timestamp_utc".into(), ts_ms)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

pub fn klines_to_frame(rows: &[KlineRow]) -> Result<DataFrame, DataError> {
    let f = |get: fn(&KlineRow) -> f64| rows.iter().map(get).collect::<Vec<f64>>();
    Ok(DataFrame::new(vec![
        ts_column(rows.iter().map(|r| r.ts_ms).collect())?,
        Column::new("open".into(), f(|r| r.open)),
        Column::new("high".into(), f(|r| r.high)),
        Column::new("low".into(), f(|r| r.low)),
        Column::new("close".into(), f(|r| r.close)),
        Column::new("volume".into(), f(|r| r.volume)),
        Column::new("quote_volume".into(), f(|r| r.quote_volume)),
        Column::new(
            "num_trades".into(),
            rows.iter().map(|r| r.num_trades).collect::<Vec<i64>>(),
        ),
        Column::new("taker_buy_base_vol".into(), f(|r| r.taker_buy_base_vol)),
        Column::new("taker_buy_quote_vol".into(), f(|r| r.taker_buy_quote_vol)),
        Column::new("taker_sell_base_vol".into(), f(|r| r.taker_sell_base_vol)),
        Column::new("taker_sell_quote_vol".into(), f(|r| r.taker_sell_quote_vol)),
    ])?)
}

/// Mark/index series frame; `prefix` is "mark" or "index".
pub fn quote_klines_to_frame(rows: &[QuoteKlineRow], prefix: &str) -> Result<DataFrame, DataError> {
    let f = |get: fn(&QuoteKlineRow) -> f64| rows.iter().map(get).collect::<Vec<f64>>();
    Ok(DataFrame::new(vec![
        ts_column(rows.iter().map(|r| r.ts_ms).collect())?,
        Column::new(format!("{prefix}_open").into(), f(|r| r.open)),
        Column::new(format!("{prefix}_high").into(), f(|r| r.high)),
        Column::new(format!("{prefix}_low").into(), f(|r| r.low)),
        Column::new(format!("{prefix}_close").into(), f(|r| r.close)),
    ])?)
}

pub fn funding_to_frame(rows: &[FundingRow]) -> Result<DataFrame, DataError> {
    Ok(DataFrame::new(vec![
        ts_column(rows.iter().map(|r| r.ts_ms).collect())?,
        Column::new(
            "funding_rate".into(),
            rows.iter().map(|r| r.rate).collect::<Vec<f64>>(),
        ),
    ])?)
}

pub fn open_interest_to_frame(rows: &[OpenInterestRow]) -> Result<DataFrame, DataError> {
    Ok(DataFrame::new(vec![
        ts_column(rows.iter().map(|r| r.ts_ms).collect())?,
        Column::new(
            "open_interest".into(),
            rows.iter().map(|r| r.open_interest).collect::<Vec<f64>>(),
        ),
    ])?)
}

/// Left-join all secondaries onto the primary spine and forward-fill funding.
///
/// Empty secondary frames are joined like any other — their columns come out
/// all-null, which is the graceful-degradation contract for absent series.
pub fn merge(
    primary: DataFrame,
    mark: DataFrame,
    index: DataFrame,
    funding: DataFrame,
    open_interest: DataFrame,
) -> Result<DataFrame, DataError> {
    let mut lf = primary.lazy();
    for secondary in [mark, index, funding, open_interest] {
        // Keep the spine's row order through every join; forward-fill below
        // depends on it.
        let args = JoinArgs {
            how: JoinType::Left,
            maintain_order: MaintainOrderJoin::Left,
            ..JoinArgs::default()
        };
        lf = lf.join(
            secondary.lazy(),
            [col("timestamp_utc")],
            [col("timestamp_utc")],
            args,
        );
    }
    let mut df = lf.collect()?;

    let filled = df
        .column("funding_rate")?
        .as_materialized_series()
        .fill_null(FillNullStrategy::Forward(None))?;
    df.replace("funding_rate", filled)?;

    Ok(df)
}
