//! Scanner Service
//!
//! Read path: joins the latest daily and hourly snapshots, classifies each
//! instrument and projects the result for display.

use crate::confluence::{classify, ClassifiedRecord, ClassifierThresholds, Direction, Momentum, Regime, Status, Volatility};
use crate::state::AppState;
use crate::types::{MatrixRow, TIMESTAMP_FORMAT};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Classified row ready for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRow {
    pub ticker: String,
    pub status: Status,
    pub current_price: f64,
    pub daily_adx: Option<f64>,
    pub hourly_rsi: Option<f64>,
    pub hourly_bb_width: Option<f64>,
    pub hourly_min_bb_width_20: Option<f64>,
    pub hourly_macd_line: Option<f64>,
    pub hourly_macd_signal: Option<f64>,
    pub regime: Regime,
    pub volatility: Volatility,
    pub momentum: Momentum,
    pub direction: Direction,
    pub last_updated: String,
}

/// Two-decimal rounding applied to display values only
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round_opt(v: Option<f64>) -> Option<f64> {
    v.map(round2)
}

impl From<ClassifiedRecord> for DisplayRow {
    fn from(c: ClassifiedRecord) -> Self {
        let row = c.row;
        Self {
            ticker: row.instrument,
            status: c.status,
            current_price: round2(row.current_price),
            daily_adx: round_opt(row.daily_adx),
            hourly_rsi: round_opt(row.hourly_rsi),
            hourly_bb_width: round_opt(row.hourly_bb_width),
            hourly_min_bb_width_20: round_opt(row.hourly_min_bb_width_20),
            hourly_macd_line: round_opt(row.hourly_macd_line),
            hourly_macd_signal: round_opt(row.hourly_macd_signal),
            regime: c.labels.regime,
            volatility: c.labels.volatility,
            momentum: c.labels.momentum,
            direction: c.labels.direction,
            last_updated: row.last_updated.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixStatus {
    Ok,
    NoData,
    RefreshFailed,
}

/// One computed display matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixView {
    pub status: MatrixStatus,
    pub rows: Vec<DisplayRow>,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MatrixView {
    fn new(status: MatrixStatus, rows: Vec<DisplayRow>, message: Option<String>) -> Self {
        Self {
            status,
            rows,
            generated_at: Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string(),
            message,
        }
    }

    pub fn ok(rows: Vec<DisplayRow>) -> Self {
        Self::new(MatrixStatus::Ok, rows, None)
    }

    pub fn no_data() -> Self {
        Self::new(
            MatrixStatus::NoData,
            Vec::new(),
            Some("No data found. Run the ingest first.".to_string()),
        )
    }

    pub fn refresh_failed(message: String) -> Self {
        Self::new(MatrixStatus::RefreshFailed, Vec::new(), Some(message))
    }
}

/// Scanner service for the read path
pub struct ScannerService;

impl ScannerService {
    /// Build the display matrix from the current store contents.
    ///
    /// A read failure is reported as `refresh_failed`, never as an error.
    pub fn get_matrix(state: &AppState) -> MatrixView {
        match state.store.query_matrix() {
            Ok(rows) if rows.is_empty() => MatrixView::no_data(),
            Ok(rows) => {
                debug!("ScannerService::get_matrix - {} instruments", rows.len());
                MatrixView::ok(Self::classify_rows(rows, &state.config.thresholds))
            }
            Err(e) => {
                error!("Failed to read scanner matrix: {}", e);
                MatrixView::refresh_failed(e.to_string())
            }
        }
    }

    /// Classify on full-precision values, then round for display
    pub fn classify_rows(rows: Vec<MatrixRow>, thresholds: &ClassifierThresholds) -> Vec<DisplayRow> {
        rows.into_iter()
            .map(|row| DisplayRow::from(classify(row, thresholds)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::datasource::YahooSource;
    use crate::db::memory::MemoryStore;
    use crate::db::test_support::{base_time, records};
    use crate::db::BarStore;
    use crate::error::{AppError, Result};
    use crate::types::{RowCount, Snapshot, Timeframe};
    use std::sync::Arc;
    use std::time::Duration;

    fn row(rsi: f64, width: f64, min: f64) -> MatrixRow {
        MatrixRow {
            instrument: "TSLA".to_string(),
            daily_adx: Some(31.234),
            hourly_rsi: Some(rsi),
            hourly_bb_width: Some(width),
            hourly_min_bb_width_20: Some(min),
            hourly_macd_line: Some(1.2),
            hourly_macd_signal: Some(0.8),
            current_price: 245.6789,
            last_updated: base_time(),
        }
    }

    fn state_with(store: Arc<dyn BarStore>) -> AppState {
        let source = Arc::new(YahooSource::new(Duration::from_secs(1)).unwrap());
        AppState::with_parts(ScannerConfig::default(), store, source)
    }

    #[test]
    fn test_rounding_happens_after_classification() {
        // 29.996 is oversold but displays as 30.0
        let rows = ScannerService::classify_rows(vec![row(29.996, 0.10, 0.05)], &ClassifierThresholds::default());

        assert_eq!(rows[0].status, Status::BullishPullback);
        assert_eq!(rows[0].momentum, Momentum::Oversold);
        assert_eq!(rows[0].hourly_rsi, Some(30.0));
        assert_eq!(rows[0].current_price, 245.68);
        assert_eq!(rows[0].daily_adx, Some(31.23));
        assert_eq!(rows[0].last_updated, "2024-03-01 14:30:00");
    }

    #[test]
    fn test_squeeze_uses_unrounded_widths() {
        // 0.0545 <= 0.0499 * 1.1, although both round to 0.05
        let rows = ScannerService::classify_rows(vec![row(50.0, 0.0545, 0.0499)], &ClassifierThresholds::default());
        assert_eq!(rows[0].status, Status::Squeeze);
        assert_eq!(rows[0].hourly_bb_width, Some(0.05));
    }

    #[test]
    fn test_empty_store_reports_no_data() {
        let state = state_with(Arc::new(MemoryStore::new()));
        let view = ScannerService::get_matrix(&state);
        assert_eq!(view.status, MatrixStatus::NoData);
        assert!(view.rows.is_empty());
    }

    #[test]
    fn test_populated_store_reports_rows_in_ticker_order() {
        let store = Arc::new(MemoryStore::new());
        for ticker in ["QQQ", "AAPL"] {
            store.upsert(&records(ticker, Timeframe::Daily, 30, &[Some(0.2)])).unwrap();
            store.upsert(&records(ticker, Timeframe::Hourly, 30, &[Some(0.3)])).unwrap();
        }

        let view = ScannerService::get_matrix(&state_with(store));
        assert_eq!(view.status, MatrixStatus::Ok);
        let tickers: Vec<&str> = view.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "QQQ"]);
        // width equals the trailing minimum, so the bands are squeezed
        assert_eq!(view.rows[0].status, Status::Squeeze);
    }

    struct FailingStore;

    impl BarStore for FailingStore {
        fn upsert(&self, _rows: &[crate::types::BarRecord]) -> Result<usize> {
            Ok(0)
        }

        fn latest_snapshot(&self, _timeframe: Timeframe) -> Result<Vec<Snapshot>> {
            Err(AppError::Persistence("disk gone".to_string()))
        }

        fn row_counts(&self) -> Result<Vec<RowCount>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_read_failure_reports_refresh_failed() {
        let view = ScannerService::get_matrix(&state_with(Arc::new(FailingStore)));
        assert_eq!(view.status, MatrixStatus::RefreshFailed);
        assert!(view.message.unwrap().contains("disk gone"));
    }

    #[test]
    fn test_view_serialization() {
        let view = MatrixView::ok(ScannerService::classify_rows(
            vec![row(25.0, 0.10, 0.05)],
            &ClassifierThresholds::default(),
        ));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["rows"][0]["status"], "BULLISH PULLBACK");
        assert_eq!(json["rows"][0]["regime"], "TRENDING");
        assert!(json.get("message").is_none());
    }
}
