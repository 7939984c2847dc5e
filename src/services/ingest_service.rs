//! Ingest Service
//!
//! Write path of the scanner: for every watchlist instrument and configured
//! timeframe, fetch bars, normalize them, compute indicators and upsert.
//! Called by the CLI `ingest` command and the REST API.

use crate::config::FetchSpec;
use crate::datasource::normalize_bars;
use crate::error::{AppError, Result};
use crate::indicators::{compute_indicators, IndicatorParams};
use crate::state::AppState;
use crate::types::{Bar, BarRecord, MatrixRow, Timeframe, TIMESTAMP_FORMAT};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const PREVIEW_ROWS: usize = 5;

/// Result of one (instrument, timeframe) unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    Stored { rows: usize },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub instrument: String,
    pub timeframe: Timeframe,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

/// Outcome of a full ingest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Units in watchlist order, daily before hourly
    pub units: Vec<UnitReport>,
    pub duration_ms: u64,
}

impl IngestReport {
    pub fn stored(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Stored { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed { .. }))
    }

    /// Rows written across all units
    pub fn total_rows(&self) -> usize {
        self.units
            .iter()
            .map(|u| match u.outcome {
                UnitOutcome::Stored { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.outcome)).count()
    }
}

/// Last recorded outcome of a unit, kept on the application state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    #[serde(flatten)]
    pub outcome: UnitOutcome,
    pub updated_at: String,
}

/// Flat status entry for API consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStatusEntry {
    pub instrument: String,
    pub timeframe: Timeframe,
    #[serde(flatten)]
    pub status: UnitStatus,
}

/// Ingest service for the write path
pub struct IngestService;

impl IngestService {
    /// Ingest the whole watchlist.
    ///
    /// Instruments run concurrently up to `max_concurrency`; a failing unit
    /// never aborts the run.
    pub async fn run(state: &Arc<AppState>) -> IngestReport {
        let started = Instant::now();
        let watchlist = state.config.watchlist.clone();
        info!(
            "IngestService::run - {} instruments from {}, {} timeframes, concurrency {}",
            watchlist.len(),
            state.source.id(),
            state.config.fetch.len(),
            state.config.max_concurrency
        );

        let per_instrument: Vec<Vec<UnitReport>> = stream::iter(watchlist.iter().cloned())
            .map(|instrument| {
                let state = Arc::clone(state);
                async move { Self::ingest_instrument(&state, &instrument).await }
            })
            .buffer_unordered(state.config.max_concurrency.max(1))
            .collect()
            .await;

        let order: HashMap<&str, usize> = watchlist
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let mut units: Vec<UnitReport> = per_instrument.into_iter().flatten().collect();
        units.sort_by_key(|u| (order.get(u.instrument.as_str()).copied(), u.timeframe));

        let report = IngestReport {
            units,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Ingest complete in {} ms: {} stored ({} rows), {} skipped, {} failed",
            report.duration_ms,
            report.stored(),
            report.total_rows(),
            report.skipped(),
            report.failed()
        );
        Self::log_row_counts(state).await;
        Self::log_matrix_preview(state).await;

        report
    }

    /// Ingest every configured timeframe of one instrument, in order
    pub async fn ingest_instrument(state: &Arc<AppState>, instrument: &str) -> Vec<UnitReport> {
        let mut reports = Vec::with_capacity(state.config.fetch.len());

        for spec in &state.config.fetch {
            info!("Processing {} ({})", instrument, spec.interval);
            let outcome = Self::ingest_unit(state, instrument, spec).await;

            match &outcome {
                UnitOutcome::Stored { rows } => {
                    info!("{} {}: stored {} rows", instrument, spec.timeframe, rows)
                }
                UnitOutcome::Skipped { reason } => warn!("{} {}: skipped, {}", instrument, spec.timeframe, reason),
                UnitOutcome::Failed { error } => error!("{} {}: failed, {}", instrument, spec.timeframe, error),
            }

            state.ingest_status.insert(
                (instrument.to_string(), spec.timeframe),
                UnitStatus {
                    outcome: outcome.clone(),
                    updated_at: Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string(),
                },
            );

            reports.push(UnitReport {
                instrument: instrument.to_string(),
                timeframe: spec.timeframe,
                outcome,
            });
        }

        reports
    }

    async fn ingest_unit(state: &Arc<AppState>, instrument: &str, spec: &FetchSpec) -> UnitOutcome {
        let timeout = Duration::from_secs(state.config.fetch_timeout_secs);

        let fetched = match tokio::time::timeout(timeout, state.source.fetch(instrument, spec)).await {
            Ok(Ok(bars)) => bars,
            Ok(Err(e)) => return UnitOutcome::Failed { error: e.to_string() },
            Err(_) => {
                let e = AppError::Timeout(format!(
                    "fetching {} {} took longer than {}s",
                    instrument, spec.interval, state.config.fetch_timeout_secs
                ));
                return UnitOutcome::Failed { error: e.to_string() };
            }
        };

        let bars = normalize_bars(instrument, fetched);
        if bars.is_empty() {
            let e = AppError::DataUnavailable {
                instrument: instrument.to_string(),
                timeframe: spec.timeframe.to_string(),
            };
            return UnitOutcome::Skipped { reason: e.to_string() };
        }

        match Self::store_series(state, instrument, spec.timeframe, bars).await {
            Ok(rows) => UnitOutcome::Stored { rows },
            Err(e) => UnitOutcome::Failed { error: e.to_string() },
        }
    }

    /// Compute indicators and upsert one normalized series off the async runtime
    pub async fn store_series(
        state: &AppState,
        instrument: &str,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<usize> {
        let store = Arc::clone(&state.store);
        let params = state.config.indicators.clone();
        let instrument = instrument.to_string();

        tokio::task::spawn_blocking(move || {
            let records = build_records(&instrument, timeframe, bars, &params);
            store.upsert(&records)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Ingest task failed: {}", e)))?
    }

    /// Current unit statuses, ordered by instrument then timeframe
    pub fn statuses(state: &AppState) -> Vec<UnitStatusEntry> {
        let mut entries: Vec<UnitStatusEntry> = state
            .ingest_status
            .iter()
            .map(|entry| {
                let (instrument, timeframe) = entry.key();
                UnitStatusEntry {
                    instrument: instrument.clone(),
                    timeframe: *timeframe,
                    status: entry.value().clone(),
                }
            })
            .collect();
        entries.sort_by(|a, b| (&a.instrument, a.timeframe).cmp(&(&b.instrument, b.timeframe)));
        entries
    }

    async fn log_row_counts(state: &AppState) {
        let store = Arc::clone(&state.store);
        match tokio::task::spawn_blocking(move || store.row_counts()).await {
            Ok(Ok(counts)) => {
                for c in counts {
                    info!("{:<6} {:<3} {:>6} rows", c.instrument, c.timeframe, c.count);
                }
            }
            Ok(Err(e)) => error!("Failed to read row counts: {}", e),
            Err(e) => error!("Row count task failed: {}", e),
        }
    }

    /// Log the joined matrix as the scan will see it, or warn when it is empty
    async fn log_matrix_preview(state: &AppState) {
        let store = Arc::clone(&state.store);
        let rows = match tokio::task::spawn_blocking(move || store.joined_matrix()).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Matrix preview task failed: {}", e);
                return;
            }
        };

        if rows.is_empty() {
            warn!("Scanner matrix is empty");
            return;
        }
        info!("Scanner matrix preview ({} instruments):", rows.len());
        for line in preview_lines(&rows) {
            info!("{}", line);
        }
    }
}

/// One line per matrix row, the last `PREVIEW_ROWS` instruments only
pub fn preview_lines(rows: &[MatrixRow]) -> Vec<String> {
    let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{:.2}", x));
    rows[rows.len().saturating_sub(PREVIEW_ROWS)..]
        .iter()
        .map(|r| {
            format!(
                "{:<6} adx {:>6} rsi {:>6} bbw {:>6} min20 {:>6} price {:.2}",
                r.instrument,
                opt(r.daily_adx),
                opt(r.hourly_rsi),
                opt(r.hourly_bb_width),
                opt(r.hourly_min_bb_width_20),
                r.current_price
            )
        })
        .collect()
}

/// Pair each bar with its indicator row
pub fn build_records(
    instrument: &str,
    timeframe: Timeframe,
    bars: Vec<Bar>,
    params: &IndicatorParams,
) -> Vec<BarRecord> {
    let indicators = compute_indicators(&bars, params);
    bars.into_iter()
        .zip(indicators)
        .map(|(bar, indicators)| BarRecord {
            instrument: instrument.to_string(),
            timeframe,
            bar,
            indicators,
        })
        .collect()
}
