//! DuckDB data models

use crate::error::{AppError, Result};
use crate::types::{Bar, BarRecord, IndicatorSet, MatrixRow, Timeframe};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Flat `candles` row as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleRow {
    pub ticker: String,
    pub timeframe: String,
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub adx_14: Option<f64>,
    pub rsi_14: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
}

impl From<&BarRecord> for CandleRow {
    fn from(r: &BarRecord) -> Self {
        Self {
            ticker: r.instrument.clone(),
            timeframe: r.timeframe.as_str().to_string(),
            timestamp: format_timestamp(&r.bar.timestamp),
            open: r.bar.open,
            high: r.bar.high,
            low: r.bar.low,
            close: r.bar.close,
            volume: r.bar.volume,
            adx_14: r.indicators.adx_14,
            rsi_14: r.indicators.rsi_14,
            bb_upper: r.indicators.bb_upper,
            bb_lower: r.indicators.bb_lower,
            bb_width: r.indicators.bb_width,
            macd_line: r.indicators.macd_line,
            macd_signal: r.indicators.macd_signal,
        }
    }
}

impl TryFrom<CandleRow> for BarRecord {
    type Error = AppError;

    fn try_from(row: CandleRow) -> Result<Self> {
        let timeframe: Timeframe = row
            .timeframe
            .parse()
            .map_err(AppError::Persistence)?;

        Ok(BarRecord {
            instrument: row.ticker,
            timeframe,
            bar: Bar {
                timestamp: parse_timestamp(&row.timestamp)?,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            },
            indicators: IndicatorSet {
                adx_14: row.adx_14,
                rsi_14: row.rsi_14,
                bb_upper: row.bb_upper,
                bb_lower: row.bb_lower,
                bb_width: row.bb_width,
                macd_line: row.macd_line,
                macd_signal: row.macd_signal,
            },
        })
    }
}

/// Timestamp text bound on write. DuckDB `TIMESTAMP` keeps microseconds.
const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// `%.f` accepts an optional fractional part
const READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// SQL expression rendering a `TIMESTAMP` column in a form `parse_timestamp` reads
pub fn timestamp_sql(column: &str) -> String {
    format!("strftime({}, '%Y-%m-%d %H:%M:%S.%f')", column)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(WRITE_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, READ_FORMAT)
        .map_err(|e| AppError::Persistence(format!("Bad timestamp '{}': {}", raw, e)))
}

/// Row of the `scanner_matrix` view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixViewRow {
    pub ticker: String,
    pub daily_adx: Option<f64>,
    pub hourly_rsi: Option<f64>,
    pub hourly_bb_width: Option<f64>,
    pub hourly_min_bb_width_20: Option<f64>,
    pub hourly_macd_line: Option<f64>,
    pub hourly_macd_signal: Option<f64>,
    pub current_price: f64,
    pub last_updated: String,
}

impl TryFrom<MatrixViewRow> for MatrixRow {
    type Error = AppError;

    fn try_from(row: MatrixViewRow) -> Result<Self> {
        Ok(MatrixRow {
            instrument: row.ticker,
            daily_adx: row.daily_adx,
            hourly_rsi: row.hourly_rsi,
            hourly_bb_width: row.hourly_bb_width,
            hourly_min_bb_width_20: row.hourly_min_bb_width_20,
            hourly_macd_line: row.hourly_macd_line,
            hourly_macd_signal: row.hourly_macd_signal,
            current_price: row.current_price,
            last_updated: parse_timestamp(&row.last_updated)?,
        })
    }
}
