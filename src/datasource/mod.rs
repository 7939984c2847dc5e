//! Market data source adapters

pub mod yahoo;

use crate::config::FetchSpec;
use crate::error::Result;
use crate::types::Bar;
use async_trait::async_trait;
use tracing::warn;

pub use yahoo::YahooSource;

/// Provider of raw OHLCV bars
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Source ID (e.g., "yahoo")
    fn id(&self) -> &'static str;

    /// Fetch bars for one instrument and timeframe.
    ///
    /// Timestamps are naive UTC. An unknown or delisted instrument yields an
    /// empty vector, not an error.
    async fn fetch(&self, instrument: &str, spec: &FetchSpec) -> Result<Vec<Bar>>;
}

/// Prepare a fetched series for the indicator engine: drop bars with an
/// inconsistent OHLC envelope, sort ascending, and keep the last bar seen for
/// any repeated timestamp.
pub fn normalize_bars(instrument: &str, mut bars: Vec<Bar>) -> Vec<Bar> {
    let before = bars.len();
    bars.retain(Bar::is_valid);
    let dropped = before - bars.len();
    if dropped > 0 {
        warn!("{}: dropped {} malformed bars", instrument, dropped);
    }

    // stable sort keeps arrival order among equal timestamps
    bars.sort_by_key(|b| b.timestamp);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bar(hour: i64, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(13, 30, 0)
                .unwrap()
                + Duration::hours(hour),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 500,
        }
    }

    #[test]
    fn test_normalize_sorts_dedupes_and_drops_malformed() {
        let mut broken = bar(1, 50.0);
        broken.high = 10.0;

        let out = normalize_bars("AMD", vec![bar(2, 12.0), bar(0, 10.0), broken, bar(2, 13.0), bar(1, 11.0)]);

        let closes: Vec<f64> = out.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![10.0, 11.0, 13.0]);
        assert!(out.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
