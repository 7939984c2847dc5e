use super::{check_finite, check_window, IndicatorError};

/// ADX (Average Directional Index) with Wilder smoothing.
///
/// Algorithm:
/// 1. Compute +DM, -DM and true range from consecutive bars
/// 2. Sum the first `window` of each, then Wilder-smooth (sum form)
/// 3. +DI / -DI = smoothed DM / smoothed TR * 100
/// 4. DX = |+DI - -DI| / (+DI + -DI) * 100
/// 5. ADX = mean of the first `window` DX values, then Wilder-smoothed
///
/// The first ADX value lands on bar `2 * window - 1`.
#[derive(Debug, Clone)]
pub struct AdxIndicator {
    window: usize,
    prev_high: f64,
    prev_low: f64,
    prev_close: f64,
    smoothed_plus_dm: f64,
    smoothed_minus_dm: f64,
    smoothed_tr: f64,
    dx_sum: f64,
    adx_value: f64,
    count: usize,
    dx_count: usize,
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Need first bar to set prev_high/low/close.
    Init,
    /// Summing the first `window` DM/TR values.
    Accumulate,
    /// Averaging the first `window` DX values.
    DxAccumulate,
    /// Wilder smoothing active.
    Warm,
}

impl AdxIndicator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_high: 0.0,
            prev_low: 0.0,
            prev_close: 0.0,
            smoothed_plus_dm: 0.0,
            smoothed_minus_dm: 0.0,
            smoothed_tr: 0.0,
            dx_sum: 0.0,
            adx_value: 0.0,
            count: 0,
            dx_count: 0,
            phase: Phase::Init,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let out = match self.phase {
            Phase::Init => {
                self.phase = Phase::Accumulate;
                None
            }
            Phase::Accumulate => {
                let (plus_dm, minus_dm, tr) = self.compute_dm_tr(high, low);
                self.smoothed_plus_dm += plus_dm;
                self.smoothed_minus_dm += minus_dm;
                self.smoothed_tr += tr;
                self.count += 1;

                if self.count >= self.window {
                    self.dx_sum = self.compute_dx();
                    self.dx_count = 1;
                    self.phase = Phase::DxAccumulate;
                    self.try_finish_dx_average()
                } else {
                    None
                }
            }
            Phase::DxAccumulate => {
                self.wilder_step(high, low);
                self.dx_sum += self.compute_dx();
                self.dx_count += 1;
                self.try_finish_dx_average()
            }
            Phase::Warm => {
                self.wilder_step(high, low);
                let dx = self.compute_dx();
                let w = self.window as f64;
                self.adx_value = (self.adx_value * (w - 1.0) + dx) / w;
                Some(self.adx_value)
            }
        };

        self.prev_high = high;
        self.prev_low = low;
        self.prev_close = close;
        out
    }

    fn try_finish_dx_average(&mut self) -> Option<f64> {
        if self.dx_count < self.window {
            return None;
        }
        self.adx_value = self.dx_sum / self.window as f64;
        self.phase = Phase::Warm;
        Some(self.adx_value)
    }

    fn compute_dm_tr(&self, high: f64, low: f64) -> (f64, f64, f64) {
        let up_move = high - self.prev_high;
        let down_move = self.prev_low - low;

        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        let tr = (high - low)
            .max((high - self.prev_close).abs())
            .max((low - self.prev_close).abs());

        (plus_dm, minus_dm, tr)
    }

    fn wilder_step(&mut self, high: f64, low: f64) {
        let (plus_dm, minus_dm, tr) = self.compute_dm_tr(high, low);
        let w = self.window as f64;
        // new = prev - prev/N + current
        self.smoothed_plus_dm = self.smoothed_plus_dm - self.smoothed_plus_dm / w + plus_dm;
        self.smoothed_minus_dm = self.smoothed_minus_dm - self.smoothed_minus_dm / w + minus_dm;
        self.smoothed_tr = self.smoothed_tr - self.smoothed_tr / w + tr;
    }

    fn compute_dx(&self) -> f64 {
        if self.smoothed_tr <= 0.0 {
            return 0.0;
        }
        let di_pos = self.smoothed_plus_dm / self.smoothed_tr * 100.0;
        let di_neg = self.smoothed_minus_dm / self.smoothed_tr * 100.0;
        let di_sum = di_pos + di_neg;
        if di_sum > 0.0 {
            (di_pos - di_neg).abs() / di_sum * 100.0
        } else {
            0.0
        }
    }
}

/// ADX over parallel high/low/close series, aligned to the input.
pub fn adx(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    window: usize,
) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_window("adx", window)?;
    if highs.len() != lows.len() || lows.len() != closes.len() {
        return Err(IndicatorError::LengthMismatch { indicator: "adx" });
    }
    check_finite("adx", highs)?;
    check_finite("adx", lows)?;
    check_finite("adx", closes)?;

    let mut ind = AdxIndicator::new(window);
    Ok(highs
        .iter()
        .zip(lows)
        .zip(closes)
        .map(|((&h, &l), &c)| ind.update(h, l, c))
        .collect())
}
