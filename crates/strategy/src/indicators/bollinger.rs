/// Bollinger Bands: rolling SMA ± `num_std` population standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub period: usize,
    pub num_std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbOutput {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

impl BollingerBands {
    pub fn new(period: usize, num_std: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self { period, num_std }
    }

    /// Bands for every value (oldest first); `None` before index `period - 1`.
    pub fn series(&self, data: &[f64]) -> Vec<Option<BbOutput>> {
        let mut out = vec![None; data.len()];
        if data.len() < self.period {
            return out;
        }
        for (end, slot) in out.iter_mut().enumerate().skip(self.period - 1) {
            let window = &data[end + 1 - self.period..=end];
            let n = self.period as f64;
            let middle = window.iter().sum::<f64>() / n;
            let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            *slot = Some(BbOutput {
                lower: middle - self.num_std * std,
                middle,
                upper: middle + self.num_std * std,
            });
        }
        out
    }
}
