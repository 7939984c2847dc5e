use super::{check_finite, check_window, IndicatorError, RingBuf};

/// Bollinger Bands: rolling SMA ± `num_std` population standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    ring: RingBuf,
    num_std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// (upper − lower) / middle, `None` when middle is zero
    pub width: Option<f64>,
}

impl BollingerBands {
    pub fn new(window: usize, num_std: f64) -> Self {
        Self {
            ring: RingBuf::new(window),
            num_std,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<BbOutput> {
        self.ring.push(close);
        if !self.ring.full() {
            return None;
        }
        let middle = self.ring.mean();
        let std = self.ring.std_pop();
        let upper = middle + self.num_std * std;
        let lower = middle - self.num_std * std;
        let width = if middle == 0.0 {
            None
        } else {
            Some((upper - lower) / middle)
        };
        Some(BbOutput {
            upper,
            middle,
            lower,
            width,
        })
    }
}

/// Bollinger Bands over a close series, aligned to the input.
pub fn bollinger(
    closes: &[f64],
    window: usize,
    num_std: f64,
) -> Result<Vec<Option<BbOutput>>, IndicatorError> {
    check_window("bbands", window)?;
    if !num_std.is_finite() || num_std < 0.0 {
        return Err(IndicatorError::InvalidParameter {
            indicator: "bbands",
            reason: format!("std multiplier must be finite and non-negative, got {}", num_std),
        });
    }
    check_finite("bbands", closes)?;

    let mut bb = BollingerBands::new(window, num_std);
    Ok(closes.iter().map(|&c| bb.update(c)).collect())
}
