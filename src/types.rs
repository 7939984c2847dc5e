//! Common market data types

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage/display format for naive UTC timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bar sampling granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1h")]
    Hourly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 2] = [Timeframe::Daily, Timeframe::Hourly];

    /// Stored representation ("1d" / "1h")
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "1d",
            Timeframe::Hourly => "1h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Timeframe::Daily),
            "1h" => Ok(Timeframe::Hourly),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

/// One OHLCV observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// True when the OHLC envelope is consistent and every field is finite.
    pub fn is_valid(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite();

        finite
            && self.volume >= 0
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// Indicator columns attached to a bar. `None` means warm-up or failed computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub adx_14: Option<f64>,
    pub rsi_14: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
}

/// A persisted candle row: key + OHLCV + indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub bar: Bar,
    pub indicators: IndicatorSet,
}

/// Latest row per (instrument, timeframe), recomputed at query time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub record: BarRecord,
    /// Trailing 20-row minimum of bb_width (hourly snapshots only)
    pub min_bb_width_20: Option<f64>,
}

/// Joined daily/hourly snapshot for one instrument, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRow {
    pub instrument: String,
    pub daily_adx: Option<f64>,
    pub hourly_rsi: Option<f64>,
    pub hourly_bb_width: Option<f64>,
    pub hourly_min_bb_width_20: Option<f64>,
    pub hourly_macd_line: Option<f64>,
    pub hourly_macd_signal: Option<f64>,
    pub current_price: f64,
    pub last_updated: NaiveDateTime,
}

impl MatrixRow {
    /// Build a matrix row from the daily and hourly snapshots of one instrument.
    pub fn join(daily: &Snapshot, hourly: &Snapshot) -> Self {
        Self {
            instrument: daily.record.instrument.clone(),
            daily_adx: daily.record.indicators.adx_14,
            hourly_rsi: hourly.record.indicators.rsi_14,
            hourly_bb_width: hourly.record.indicators.bb_width,
            hourly_min_bb_width_20: hourly.min_bb_width_20,
            hourly_macd_line: hourly.record.indicators.macd_line,
            hourly_macd_signal: hourly.record.indicators.macd_signal,
            current_price: hourly.record.bar.close,
            last_updated: hourly.record.bar.timestamp,
        }
    }
}

/// Row count per (instrument, timeframe)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCount {
    pub instrument: String,
    pub timeframe: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn test_bar_envelope_validation() {
        assert!(bar(10.0, 11.0, 9.0, 10.5).is_valid());
        // close above the high
        assert!(!bar(10.0, 10.2, 9.0, 10.5).is_valid());
        // open below the low
        assert!(!bar(8.5, 11.0, 9.0, 10.5).is_valid());
        assert!(!bar(f64::NAN, 11.0, 9.0, 10.5).is_valid());
    }

    #[test]
    fn test_timeframe_round_trip_through_str() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("5m".parse::<Timeframe>().is_err());
    }
}
