//! DuckDB migrations

use crate::error::Result;
use duckdb::Connection;

/// Run all DuckDB migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // name is the primary key since we don't need auto-increment
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            name VARCHAR PRIMARY KEY,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )?;

    run_migration(conn, "001_candles", CREATE_CANDLES)?;
    run_migration(conn, "002_scanner_matrix", CREATE_SCANNER_MATRIX)?;

    tracing::info!("DuckDB migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM migrations WHERE name = ?",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running DuckDB migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_CANDLES: &str = r#"
CREATE TABLE IF NOT EXISTS candles (
    ticker VARCHAR NOT NULL,
    timeframe VARCHAR NOT NULL,
    timestamp TIMESTAMP NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume BIGINT NOT NULL,

    adx_14 DOUBLE,
    rsi_14 DOUBLE,
    bb_upper DOUBLE,
    bb_lower DOUBLE,
    bb_width DOUBLE,
    macd_line DOUBLE,
    macd_signal DOUBLE,

    PRIMARY KEY (ticker, timeframe, timestamp)
);
"#;

// Latest hourly row carries the 20-row trailing minimum of bb_width;
// instruments without both timeframes drop out of the inner join.
const CREATE_SCANNER_MATRIX: &str = r#"
CREATE OR REPLACE VIEW scanner_matrix AS
WITH hourly_data AS (
    SELECT
        *,
        MIN(bb_width) OVER (
            PARTITION BY ticker
            ORDER BY timestamp
            ROWS BETWEEN 19 PRECEDING AND CURRENT ROW
        ) AS min_bb_width_20
    FROM candles
    WHERE timeframe = '1h'
),
latest_hourly AS (
    SELECT *
    FROM hourly_data
    QUALIFY ROW_NUMBER() OVER (PARTITION BY ticker ORDER BY timestamp DESC) = 1
),
latest_daily AS (
    SELECT *
    FROM candles
    WHERE timeframe = '1d'
    QUALIFY ROW_NUMBER() OVER (PARTITION BY ticker ORDER BY timestamp DESC) = 1
)
SELECT
    d.ticker,
    d.adx_14 AS daily_adx,
    h.rsi_14 AS hourly_rsi,
    h.bb_width AS hourly_bb_width,
    h.min_bb_width_20 AS hourly_min_bb_width_20,
    h.macd_line AS hourly_macd_line,
    h.macd_signal AS hourly_macd_signal,
    h.close AS current_price,
    h.timestamp AS last_updated
FROM latest_daily d
JOIN latest_hourly h ON d.ticker = h.ticker;
"#;
