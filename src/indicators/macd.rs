use super::ema::Ema;
use super::{check_finite, check_window, IndicatorError};

/// MACD line = EMA(fast) − EMA(slow); signal = EMA(line, signal).
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    ema_fast: Ema,
    ema_slow: Ema,
    ema_signal: Ema,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MacdOutput {
    pub line: Option<f64>,
    pub signal: Option<f64>,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            ema_fast: Ema::new(fast),
            ema_slow: Ema::new(slow),
            ema_signal: Ema::new(signal),
        }
    }

    /// Feed one close. The signal EMA only sees bars where the line exists.
    pub fn update(&mut self, close: f64) -> MacdOutput {
        let fast = self.ema_fast.update(close);
        let slow = self.ema_slow.update(close);
        let line = match (fast, slow) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        };
        let signal = line.and_then(|l| self.ema_signal.update(l));
        MacdOutput { line, signal }
    }
}

/// MACD over a close series, aligned to the input.
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<Vec<MacdOutput>, IndicatorError> {
    check_window("macd", fast)?;
    check_window("macd", slow)?;
    check_window("macd", signal)?;
    if fast >= slow {
        return Err(IndicatorError::InvalidParameter {
            indicator: "macd",
            reason: format!("fast length {} must be below slow length {}", fast, slow),
        });
    }
    check_finite("macd", closes)?;

    let mut ind = MacdIndicator::new(fast, slow, signal);
    Ok(closes.iter().map(|&c| ind.update(c)).collect())
}
