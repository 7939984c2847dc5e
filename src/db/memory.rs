//! In-memory bar store
//!
//! Same contract as the DuckDB store, with the "latest row per group" and
//! trailing-minimum windows computed explicitly.

use super::{join_snapshots, BarStore, MIN_WIDTH_WINDOW};
use crate::error::Result;
use crate::types::{BarRecord, MatrixRow, RowCount, Snapshot, Timeframe};
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::collections::BTreeMap;

type Key = (String, Timeframe, NaiveDateTime);

/// Candle table held in an ordered map, so each (instrument, timeframe)
/// partition is contiguous and sorted by timestamp.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<Key, BarRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// All rows, in key order
    pub fn dump(&self) -> Vec<BarRecord> {
        self.rows.read().values().cloned().collect()
    }

    /// Every stored row for one series, ascending by timestamp
    pub fn query_series(&self, instrument: &str, timeframe: Timeframe) -> Vec<BarRecord> {
        self.rows
            .read()
            .values()
            .filter(|r| r.instrument == instrument && r.timeframe == timeframe)
            .cloned()
            .collect()
    }
}

/// Minimum of the non-null values, `None` if there are none (SQL `MIN` semantics).
fn min_ignoring_nulls<'a>(values: impl Iterator<Item = &'a Option<f64>>) -> Option<f64> {
    values
        .filter_map(|v| v.filter(|x| !x.is_nan()))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
}

/// Latest row per instrument at `timeframe`, with the trailing bb_width
/// minimum for hourly rows.
fn snapshots(table: &BTreeMap<Key, BarRecord>, timeframe: Timeframe) -> Vec<Snapshot> {
    // partition by instrument, rows already ascending by timestamp
    let mut partitions: BTreeMap<&str, Vec<&BarRecord>> = BTreeMap::new();
    for ((instrument, tf, _), record) in table.iter() {
        if *tf == timeframe {
            partitions.entry(instrument.as_str()).or_default().push(record);
        }
    }

    partitions
        .into_values()
        .filter_map(|rows| {
            let latest = *rows.last()?;
            let min_bb_width_20 = match timeframe {
                Timeframe::Hourly => {
                    let start = rows.len().saturating_sub(MIN_WIDTH_WINDOW);
                    min_ignoring_nulls(rows[start..].iter().map(|r| &r.indicators.bb_width))
                }
                Timeframe::Daily => None,
            };
            Some(Snapshot {
                record: latest.clone(),
                min_bb_width_20,
            })
        })
        .collect()
}

impl BarStore for MemoryStore {
    fn upsert(&self, rows: &[BarRecord]) -> Result<usize> {
        let mut table = self.rows.write();
        for row in rows {
            let key = (row.instrument.clone(), row.timeframe, row.bar.timestamp);
            table.insert(key, row.clone());
        }
        Ok(rows.len())
    }

    fn latest_snapshot(&self, timeframe: Timeframe) -> Result<Vec<Snapshot>> {
        Ok(snapshots(&self.rows.read(), timeframe))
    }

    /// Both snapshots are taken under one read guard, so a concurrent upsert
    /// cannot land between them.
    fn query_matrix(&self) -> Result<Vec<MatrixRow>> {
        let table = self.rows.read();
        let daily = snapshots(&table, Timeframe::Daily);
        let hourly = snapshots(&table, Timeframe::Hourly);
        Ok(join_snapshots(&daily, &hourly))
    }

    fn row_counts(&self) -> Result<Vec<RowCount>> {
        let table = self.rows.read();
        let mut counts: BTreeMap<(&str, &'static str), i64> = BTreeMap::new();
        for (instrument, tf, _) in table.keys() {
            *counts.entry((instrument.as_str(), tf.as_str())).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((instrument, timeframe), count)| RowCount {
                instrument: instrument.to_string(),
                timeframe: timeframe.to_string(),
                count,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::records;

    #[test]
    fn test_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let rows = records("AAPL", Timeframe::Hourly, 30, &[Some(0.2)]);

        store.upsert(&rows).unwrap();
        let once = store.dump();
        store.upsert(&rows).unwrap();
        assert_eq!(store.dump(), once);
        assert_eq!(store.len(), 30);
    }

    #[test]
    fn test_upsert_overwrites_existing_key() {
        let store = MemoryStore::new();
        let mut rows = records("AAPL", Timeframe::Daily, 2, &[Some(0.2)]);
        store.upsert(&rows).unwrap();

        rows[1].bar.close = 999.0;
        rows[1].bar.high = 1000.0;
        store.upsert(&rows[1..]).unwrap();

        let snap = store.latest_snapshot(Timeframe::Daily).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(snap[0].record.bar.close, 999.0);
    }

    #[test]
    fn test_latest_snapshot_picks_max_timestamp_per_instrument() {
        let store = MemoryStore::new();
        store.upsert(&records("MSFT", Timeframe::Hourly, 5, &[Some(0.3)])).unwrap();
        store.upsert(&records("AMD", Timeframe::Hourly, 8, &[Some(0.3)])).unwrap();
        store.upsert(&records("AMD", Timeframe::Daily, 50, &[Some(0.3)])).unwrap();

        let snaps = store.latest_snapshot(Timeframe::Hourly).unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].record.instrument, "AMD");
        assert_eq!(snaps[0].record.bar.close, 107.0);
        assert_eq!(snaps[1].record.instrument, "MSFT");
        assert_eq!(snaps[1].record.bar.close, 104.0);
    }

    #[test]
    fn test_trailing_min_covers_last_twenty_rows_only() {
        let store = MemoryStore::new();
        // row 0 holds the global minimum, outside the 20-row frame of row 24
        let mut widths = vec![Some(0.5); 25];
        widths[0] = Some(0.01);
        widths[10] = Some(0.2);
        widths[24] = None;
        store.upsert(&records("TSLA", Timeframe::Hourly, 25, &widths)).unwrap();

        let snap = &store.latest_snapshot(Timeframe::Hourly).unwrap()[0];
        assert_eq!(snap.min_bb_width_20, Some(0.2));
        assert_eq!(snap.record.indicators.bb_width, None);
    }

    #[test]
    fn test_trailing_min_is_null_when_frame_is_all_null() {
        let store = MemoryStore::new();
        store.upsert(&records("META", Timeframe::Hourly, 5, &[None])).unwrap();
        let snap = &store.latest_snapshot(Timeframe::Hourly).unwrap()[0];
        assert_eq!(snap.min_bb_width_20, None);
    }

    #[test]
    fn test_daily_snapshot_has_no_trailing_min() {
        let store = MemoryStore::new();
        store.upsert(&records("META", Timeframe::Daily, 5, &[Some(0.1)])).unwrap();
        let snap = &store.latest_snapshot(Timeframe::Daily).unwrap()[0];
        assert_eq!(snap.min_bb_width_20, None);
    }

    #[test]
    fn test_query_matrix_joins_snapshots_from_one_read() {
        let store = MemoryStore::new();
        store.upsert(&records("SPY", Timeframe::Daily, 30, &[Some(0.1)])).unwrap();
        store.upsert(&records("SPY", Timeframe::Hourly, 25, &[Some(0.3), Some(0.2)])).unwrap();
        store.upsert(&records("AMD", Timeframe::Daily, 5, &[None])).unwrap();

        let matrix = store.query_matrix().unwrap();
        let daily = store.latest_snapshot(Timeframe::Daily).unwrap();
        let hourly = store.latest_snapshot(Timeframe::Hourly).unwrap();

        assert_eq!(matrix, join_snapshots(&daily, &hourly));
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix[0].instrument, "SPY");
        assert_eq!(matrix[0].hourly_min_bb_width_20, Some(0.2));
        assert_eq!(matrix[0].current_price, 124.0);
    }

    #[test]
    fn test_row_counts() {
        let store = MemoryStore::new();
        store.upsert(&records("SPY", Timeframe::Daily, 4, &[None])).unwrap();
        store.upsert(&records("SPY", Timeframe::Hourly, 7, &[None])).unwrap();

        let counts = store.row_counts().unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].timeframe, "1d");
        assert_eq!(counts[0].count, 4);
        assert_eq!(counts[1].timeframe, "1h");
        assert_eq!(counts[1].count, 7);
    }
}
