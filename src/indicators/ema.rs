/// Exponential Moving Average seeded with the simple mean of its first window.
///
///   bars 0..window-2 → None (warm-up)
///   bar  window-1    → SMA of the first `window` observations
///   bar  window+     → α·price + (1−α)·prev   where α = 2/(window+1)
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    window: usize,
    count: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(window: usize) -> Self {
        Self {
            alpha: 2.0 / (window as f64 + 1.0),
            window,
            count: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    /// Feed one price, return the current EMA once warm.
    pub fn update(&mut self, price: f64) -> Option<f64> {
        self.count += 1;
        match self.value {
            None => {
                self.seed_sum += price;
                if self.count >= self.window {
                    self.value = Some(self.seed_sum / self.window as f64);
                }
            }
            Some(prev) => {
                self.value = Some(self.alpha * price + (1.0 - self.alpha) * prev);
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
