//! Indicator engine
//!
//! Pure functions over one instrument's bar series. Each indicator is computed
//! independently; if one fails its columns are left `None` for every row and
//! the others are unaffected.

pub mod adx;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

use crate::error::{AppError, Result};
use crate::types::{Bar, IndicatorSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Per-indicator computation failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndicatorError {
    #[error("{indicator}: invalid parameter: {reason}")]
    InvalidParameter {
        indicator: &'static str,
        reason: String,
    },

    #[error("{indicator}: non-finite input at row {index}")]
    NonFiniteInput { indicator: &'static str, index: usize },

    #[error("{indicator}: input columns differ in length")]
    LengthMismatch { indicator: &'static str },
}

/// Indicator lengths and multipliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub adx_length: usize,
    pub rsi_length: usize,
    pub bb_length: usize,
    pub bb_std: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            adx_length: 14,
            rsi_length: 14,
            bb_length: 20,
            bb_std: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl IndicatorParams {
    /// Reject parameterizations that would null a column on every run.
    pub fn validate(&self) -> Result<()> {
        let lengths = [
            ("adx_length", self.adx_length),
            ("rsi_length", self.rsi_length),
            ("bb_length", self.bb_length),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ];
        if let Some((name, _)) = lengths.iter().find(|(_, v)| *v == 0) {
            return Err(AppError::Validation(format!("{} must be at least 1", name)));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(AppError::Validation(
                "macd_fast must be below macd_slow".to_string(),
            ));
        }
        if !self.bb_std.is_finite() || self.bb_std < 0.0 {
            return Err(AppError::Validation("bb_std must be non-negative".to_string()));
        }
        Ok(())
    }
}

/// Compute every indicator column for a time-ordered bar series.
///
/// Output is aligned with `bars`. Empty input yields empty output.
pub fn compute_indicators(bars: &[Bar], params: &IndicatorParams) -> Vec<IndicatorSet> {
    let mut out = vec![IndicatorSet::default(); bars.len()];
    if bars.is_empty() {
        return out;
    }

    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    match adx::adx(&highs, &lows, &closes, params.adx_length) {
        Ok(values) => {
            for (row, v) in out.iter_mut().zip(values) {
                row.adx_14 = v;
            }
        }
        Err(e) => warn!("ADX column nulled: {}", e),
    }

    match rsi::rsi(&closes, params.rsi_length) {
        Ok(values) => {
            for (row, v) in out.iter_mut().zip(values) {
                row.rsi_14 = v;
            }
        }
        Err(e) => warn!("RSI column nulled: {}", e),
    }

    match bollinger::bollinger(&closes, params.bb_length, params.bb_std) {
        Ok(values) => {
            for (row, bb) in out.iter_mut().zip(values) {
                if let Some(bb) = bb {
                    row.bb_upper = Some(bb.upper);
                    row.bb_lower = Some(bb.lower);
                    row.bb_width = bb.width;
                }
            }
        }
        Err(e) => warn!("Bollinger columns nulled: {}", e),
    }

    match macd::macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal) {
        Ok(values) => {
            for (row, m) in out.iter_mut().zip(values) {
                row.macd_line = m.line;
                row.macd_signal = m.signal;
            }
        }
        Err(e) => warn!("MACD columns nulled: {}", e),
    }

    out
}

pub(crate) fn check_window(indicator: &'static str, window: usize) -> std::result::Result<(), IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::InvalidParameter {
            indicator,
            reason: "length must be at least 1".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_finite(indicator: &'static str, values: &[f64]) -> std::result::Result<(), IndicatorError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(IndicatorError::NonFiniteInput { indicator, index }),
        None => Ok(()),
    }
}

/// Ring buffer for rolling-window computations.
#[derive(Debug, Clone)]
pub struct RingBuf {
    buf: Vec<f64>,
    pos: usize,
    len: usize,
    cap: usize,
}

impl RingBuf {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity],
            pos: 0,
            len: 0,
            cap: capacity,
        }
    }

    pub fn push(&mut self, val: f64) {
        self.buf[self.pos] = val;
        self.pos = (self.pos + 1) % self.cap;
        if self.len < self.cap {
            self.len += 1;
        }
    }

    pub fn full(&self) -> bool {
        self.len == self.cap
    }

    fn values(&self) -> &[f64] {
        // order does not matter for mean/std
        &self.buf[..self.len]
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.values().iter().sum::<f64>() / self.len as f64
    }

    /// Population standard deviation (ddof=0).
    pub fn std_pop(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.values().iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.len as f64;
        var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 3.0 + i as f64 * 0.1;
                Bar {
                    timestamp: start + Duration::hours(i as i64),
                    open: close - 0.2,
                    high: close + 0.8,
                    low: close - 0.9,
                    close,
                    volume: 10_000 + i as i64,
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_series_yields_empty_output() {
        assert!(compute_indicators(&[], &IndicatorParams::default()).is_empty());
    }

    #[test]
    fn test_output_is_aligned_and_warm_up_is_null() {
        let bars = series(60);
        let out = compute_indicators(&bars, &IndicatorParams::default());
        assert_eq!(out.len(), 60);

        assert!(out[26].adx_14.is_none());
        assert!(out[27].adx_14.is_some());
        assert!(out[13].rsi_14.is_none());
        assert!(out[14].rsi_14.is_some());
        assert!(out[18].bb_width.is_none());
        assert!(out[19].bb_width.is_some());
        assert!(out[19].bb_upper.unwrap() > out[19].bb_lower.unwrap());
        assert!(out[24].macd_line.is_none());
        assert!(out[25].macd_line.is_some());
        assert!(out[32].macd_signal.is_none());
        assert!(out[33].macd_signal.is_some());
    }

    #[test]
    fn test_short_series_is_null_regardless_of_values() {
        let params = IndicatorParams::default();
        let mut bars = series(15);
        for variant in 0..3 {
            for (i, bar) in bars.iter_mut().enumerate() {
                let scale = 1.0 + variant as f64 * 10.0 + i as f64;
                bar.close *= scale;
                bar.open *= scale;
                bar.high *= scale;
                bar.low *= scale;
            }
            let out = compute_indicators(&bars, &params);
            assert!(out.iter().all(|r| r.adx_14.is_none()));
            assert!(out.iter().all(|r| r.bb_width.is_none() && r.bb_upper.is_none()));
            assert!(out.iter().all(|r| r.macd_line.is_none() && r.macd_signal.is_none()));
        }
    }

    #[test]
    fn test_failing_indicator_does_not_block_the_others() {
        let params = IndicatorParams {
            macd_fast: 30,
            macd_slow: 10,
            ..IndicatorParams::default()
        };
        let out = compute_indicators(&series(60), &params);
        assert!(out.iter().all(|r| r.macd_line.is_none() && r.macd_signal.is_none()));
        assert!(out[59].rsi_14.is_some());
        assert!(out[59].adx_14.is_some());
        assert!(out[59].bb_width.is_some());
    }

    #[test]
    fn test_non_finite_close_nulls_every_close_based_column() {
        let mut bars = series(60);
        bars[10].close = f64::NAN;
        let out = compute_indicators(&bars, &IndicatorParams::default());
        assert!(out.iter().all(|r| r.rsi_14.is_none()));
        assert!(out.iter().all(|r| r.bb_width.is_none()));
        assert!(out.iter().all(|r| r.macd_line.is_none()));
        assert!(out.iter().all(|r| r.adx_14.is_none()));
    }

    #[test]
    fn test_computation_is_deterministic() {
        let bars = series(120);
        let params = IndicatorParams::default();
        let a = compute_indicators(&bars, &params);
        let b = compute_indicators(&bars, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn test_params_validation() {
        assert!(IndicatorParams::default().validate().is_ok());
        let bad = IndicatorParams {
            rsi_length: 0,
            ..IndicatorParams::default()
        };
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
    }
}
