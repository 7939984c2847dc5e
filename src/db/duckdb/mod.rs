//! DuckDB-backed bar store

pub mod models;
mod migrations;

use super::{BarStore, MIN_WIDTH_WINDOW};
use crate::error::Result;
use crate::types::{BarRecord, MatrixRow, RowCount, Snapshot, Timeframe};
use duckdb::{Connection, Row};
use models::{timestamp_sql, CandleRow, MatrixViewRow};
use parking_lot::Mutex;
use std::path::Path;

fn candle_columns() -> String {
    format!(
        "ticker, timeframe, {},
    open, high, low, close, volume,
    adx_14, rsi_14, bb_upper, bb_lower, bb_width, macd_line, macd_signal",
        timestamp_sql("timestamp")
    )
}

/// DuckDB database wrapper
pub struct DuckDb {
    conn: Mutex<Connection>,
}

impl DuckDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    /// Every stored row for one series, ascending by timestamp
    pub fn query_series(&self, instrument: &str, timeframe: Timeframe) -> Result<Vec<BarRecord>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT {} FROM candles WHERE ticker = ? AND timeframe = ? ORDER BY timestamp ASC",
            candle_columns()
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map(duckdb::params![instrument, timeframe.as_str()], candle_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(BarRecord::try_from).collect()
    }
}

fn candle_row(row: &Row<'_>) -> duckdb::Result<CandleRow> {
    Ok(CandleRow {
        ticker: row.get(0)?,
        timeframe: row.get(1)?,
        timestamp: row.get(2)?,
        open: row.get(3)?,
        high: row.get(4)?,
        low: row.get(5)?,
        close: row.get(6)?,
        volume: row.get(7)?,
        adx_14: row.get(8)?,
        rsi_14: row.get(9)?,
        bb_upper: row.get(10)?,
        bb_lower: row.get(11)?,
        bb_width: row.get(12)?,
        macd_line: row.get(13)?,
        macd_signal: row.get(14)?,
    })
}

impl BarStore for DuckDb {
    fn upsert(&self, rows: &[BarRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();

        let tx = conn.transaction()?;

        let mut stmt = tx.prepare(
            "INSERT INTO candles (ticker, timeframe, timestamp, open, high, low, close, volume,
                                  adx_14, rsi_14, bb_upper, bb_lower, bb_width, macd_line, macd_signal)
             VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (ticker, timeframe, timestamp) DO UPDATE SET
               open = excluded.open, high = excluded.high, low = excluded.low,
               close = excluded.close, volume = excluded.volume,
               adx_14 = excluded.adx_14, rsi_14 = excluded.rsi_14,
               bb_upper = excluded.bb_upper, bb_lower = excluded.bb_lower,
               bb_width = excluded.bb_width, macd_line = excluded.macd_line,
               macd_signal = excluded.macd_signal",
        )?;

        let mut count = 0;
        for record in rows {
            let row = CandleRow::from(record);
            stmt.execute(duckdb::params![
                row.ticker,
                row.timeframe,
                row.timestamp,
                row.open,
                row.high,
                row.low,
                row.close,
                row.volume,
                row.adx_14,
                row.rsi_14,
                row.bb_upper,
                row.bb_lower,
                row.bb_width,
                row.macd_line,
                row.macd_signal,
            ])?;
            count += 1;
        }

        drop(stmt);
        tx.commit()?;

        Ok(count)
    }

    fn latest_snapshot(&self, timeframe: Timeframe) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();

        // ties on the max timestamp are impossible under the primary key
        let sql = format!(
            "WITH framed AS (
                 SELECT *,
                        MIN(bb_width) OVER (
                            PARTITION BY ticker
                            ORDER BY timestamp
                            ROWS BETWEEN {} PRECEDING AND CURRENT ROW
                        ) AS min_bb_width_20
                 FROM candles
                 WHERE timeframe = ?
             )
             SELECT {}, min_bb_width_20
             FROM framed
             QUALIFY ROW_NUMBER() OVER (PARTITION BY ticker ORDER BY timestamp DESC) = 1
             ORDER BY ticker",
            MIN_WIDTH_WINDOW - 1,
            candle_columns()
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map([timeframe.as_str()], |row| {
                let min_width: Option<f64> = row.get(15)?;
                Ok((candle_row(row)?, min_width))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(candle, min_width)| {
                Ok(Snapshot {
                    record: BarRecord::try_from(candle)?,
                    min_bb_width_20: match timeframe {
                        Timeframe::Hourly => min_width,
                        Timeframe::Daily => None,
                    },
                })
            })
            .collect()
    }

    fn row_counts(&self) -> Result<Vec<RowCount>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT ticker, timeframe, COUNT(*) AS count
             FROM candles
             GROUP BY ticker, timeframe
             ORDER BY ticker, timeframe",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RowCount {
                    instrument: row.get(0)?,
                    timeframe: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Reads the `scanner_matrix` view, so the join runs inside DuckDB.
    fn query_matrix(&self) -> Result<Vec<MatrixRow>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT ticker, daily_adx, hourly_rsi, hourly_bb_width, hourly_min_bb_width_20,
                    hourly_macd_line, hourly_macd_signal, current_price, {}
             FROM scanner_matrix
             ORDER BY ticker",
            timestamp_sql("last_updated")
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MatrixViewRow {
                    ticker: row.get(0)?,
                    daily_adx: row.get(1)?,
                    hourly_rsi: row.get(2)?,
                    hourly_bb_width: row.get(3)?,
                    hourly_min_bb_width_20: row.get(4)?,
                    hourly_macd_line: row.get(5)?,
                    hourly_macd_signal: row.get(6)?,
                    current_price: row.get(7)?,
                    last_updated: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(MatrixRow::try_from)
            .collect()
    }
}
