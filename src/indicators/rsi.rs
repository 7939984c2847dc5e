use super::{check_finite, check_window, IndicatorError};

/// RSI (Relative Strength Index) with Wilder smoothing of avg gain/loss.
///
/// The averages are seeded with the simple mean of the first `window`
/// changes, so the first value lands on bar `window`.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    window: usize,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    gain_sum: f64,
    loss_sum: f64,
    count: usize,
    warm: bool,
}

impl RsiIndicator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_close: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            count: 0,
            warm: false,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = match self.prev_close.replace(close) {
            Some(prev) => prev,
            None => return None,
        };

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if self.warm {
            let w = self.window as f64;
            self.avg_gain = (self.avg_gain * (w - 1.0) + gain) / w;
            self.avg_loss = (self.avg_loss * (w - 1.0) + loss) / w;
        } else {
            self.gain_sum += gain;
            self.loss_sum += loss;
            self.count += 1;
            if self.count < self.window {
                return None;
            }
            self.avg_gain = self.gain_sum / self.window as f64;
            self.avg_loss = self.loss_sum / self.window as f64;
            self.warm = true;
        }

        Some(self.value())
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 {
            // flat series reads as neutral, pure gains as fully overbought
            return if self.avg_gain == 0.0 { 50.0 } else { 100.0 };
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// RSI over a close series, aligned to the input.
pub fn rsi(closes: &[f64], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_window("rsi", window)?;
    check_finite("rsi", closes)?;

    let mut ind = RsiIndicator::new(window);
    Ok(closes.iter().map(|&c| ind.update(c)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_lands_on_bar_window() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let out = rsi(&closes, 14).unwrap();
        assert!(out[..14].iter().all(Option::is_none));
        assert!(out[14..].iter().all(Option::is_some));
    }

    #[test]
    fn test_monotonic_rise_is_100_and_flat_is_50() {
        let rising: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&rising, 3).unwrap()[9], Some(100.0));

        let flat = vec![42.0; 10];
        assert_eq!(rsi(&flat, 3).unwrap()[9], Some(50.0));
    }

    #[test]
    fn test_wilder_seed_matches_hand_computation() {
        // changes: +1, -1, +2 → avg gain 1.0, avg loss 1/3 → RS 3 → RSI 75
        let out = rsi(&[10.0, 11.0, 10.0, 12.0], 3).unwrap();
        assert!((out[3].unwrap() - 75.0).abs() < 1e-9);

        // next change -1: gain (1*2+0)/3, loss (1/3*2+1)/3
        let out = rsi(&[10.0, 11.0, 10.0, 12.0, 11.0], 3).unwrap();
        let g = 2.0 / 3.0;
        let l = (2.0 / 3.0 + 1.0) / 3.0;
        let expected = 100.0 - 100.0 / (1.0 + g / l);
        assert!((out[4].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_close_is_an_error() {
        let err = rsi(&[1.0, f64::NAN, 2.0], 2).unwrap_err();
        assert!(matches!(err, IndicatorError::NonFiniteInput { index: 1, .. }));
    }
}
