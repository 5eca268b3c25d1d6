/// Simple moving average of closes.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period }
    }

    /// Mean of the last `period` closes (oldest first).
    /// Returns `None` if there aren't enough values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }

    /// Average evaluated `lag` bars before the end of the series, so that
    /// the trailing `lag` values (e.g. a forming bar) never contribute.
    pub fn compute_lagged(&self, closes: &[f64], lag: usize) -> Option<f64> {
        let end = closes.len().checked_sub(lag)?;
        self.compute(&closes[..end])
    }
}
