//! Bar store
//!
//! Persistent table of OHLCV + indicator rows keyed by
//! (instrument, timeframe, timestamp), plus the derived latest-snapshot views.
//!
//! - `duckdb` - DuckDB-backed store, windows computed in SQL
//! - `memory` - in-process store, windows computed explicitly

pub mod duckdb;
pub mod memory;

use crate::error::Result;
use crate::types::{BarRecord, MatrixRow, RowCount, Snapshot, Timeframe};
use std::collections::BTreeMap;
use tracing::error;

/// Rows in the trailing bb_width minimum, inclusive of the current row
pub const MIN_WIDTH_WINDOW: usize = 20;

/// Storage backend for candle rows
pub trait BarStore: Send + Sync {
    /// Insert or replace rows by primary key. Returns the number of rows written.
    fn upsert(&self, rows: &[BarRecord]) -> Result<usize>;

    /// Latest row per instrument at `timeframe`, ordered by instrument.
    ///
    /// Hourly snapshots carry the trailing 20-row bb_width minimum.
    fn latest_snapshot(&self, timeframe: Timeframe) -> Result<Vec<Snapshot>>;

    /// Row count per (instrument, timeframe)
    fn row_counts(&self) -> Result<Vec<RowCount>>;

    /// Inner join of the daily and hourly snapshots, ordered by instrument.
    fn query_matrix(&self) -> Result<Vec<MatrixRow>> {
        let daily = self.latest_snapshot(Timeframe::Daily)?;
        let hourly = self.latest_snapshot(Timeframe::Hourly)?;
        Ok(join_snapshots(&daily, &hourly))
    }

    /// `query_matrix` that degrades to an empty matrix on failure.
    ///
    /// For callers that only display the matrix, such as the post-ingest
    /// preview. The scan path uses `query_matrix` to report `refresh_failed`.
    fn joined_matrix(&self) -> Vec<MatrixRow> {
        match self.query_matrix() {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to read scanner matrix: {}", e);
                Vec::new()
            }
        }
    }
}

/// Join daily and hourly snapshots on instrument. Instruments missing either
/// side are excluded.
pub fn join_snapshots(daily: &[Snapshot], hourly: &[Snapshot]) -> Vec<MatrixRow> {
    let hourly_by_instrument: BTreeMap<&str, &Snapshot> = hourly
        .iter()
        .map(|s| (s.record.instrument.as_str(), s))
        .collect();

    let mut rows: Vec<MatrixRow> = daily
        .iter()
        .filter_map(|d| {
            hourly_by_instrument
                .get(d.record.instrument.as_str())
                .map(|h| MatrixRow::join(d, h))
        })
        .collect();
    rows.sort_by(|a, b| a.instrument.cmp(&b.instrument));
    rows
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::test_support::records;
    use super::*;
    use crate::error::AppError;

    struct BrokenStore;

    impl BarStore for BrokenStore {
        fn upsert(&self, _rows: &[BarRecord]) -> Result<usize> {
            Err(AppError::Persistence("disk full".to_string()))
        }

        fn latest_snapshot(&self, _timeframe: Timeframe) -> Result<Vec<Snapshot>> {
            Err(AppError::Persistence("connection lost".to_string()))
        }

        fn row_counts(&self) -> Result<Vec<RowCount>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_read_failure_degrades_to_empty_matrix() {
        assert!(BrokenStore.query_matrix().is_err());
        assert!(BrokenStore.joined_matrix().is_empty());
    }

    #[test]
    fn test_join_excludes_instruments_missing_a_timeframe() {
        let store = MemoryStore::new();
        store.upsert(&records("SPY", Timeframe::Daily, 3, &[Some(0.1)])).unwrap();
        store.upsert(&records("SPY", Timeframe::Hourly, 3, &[Some(0.1)])).unwrap();
        store.upsert(&records("QQQ", Timeframe::Daily, 3, &[Some(0.1)])).unwrap();
        store.upsert(&records("IWM", Timeframe::Hourly, 3, &[Some(0.1)])).unwrap();

        let matrix = store.joined_matrix();
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix[0].instrument, "SPY");
    }
}
