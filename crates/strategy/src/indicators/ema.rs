/// Exponential Moving Average seeded with the SMA of the first `period`
/// values, then `α = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period }
    }

    /// EMA for every value (oldest first); `None` before index `period - 1`.
    pub fn series(&self, data: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; data.len()];
        if data.len() < self.period {
            return out;
        }
        let k = 2.0 / (self.period as f64 + 1.0);

        let mut ema_val = data[..self.period].iter().sum::<f64>() / self.period as f64;
        out[self.period - 1] = Some(ema_val);

        for (i, &price) in data.iter().enumerate().skip(self.period) {
            ema_val = price * k + ema_val * (1.0 - k);
            out[i] = Some(ema_val);
        }
        out
    }
}
