/// Donchian channel extremes over the trailing `period` bars of a series.
///
/// The caller decides which bars form the window; passing the history
/// without the forming bar yields the breakout levels for today.
#[derive(Debug, Clone)]
pub struct DonchianIndicator {
    pub period: usize,
}

impl DonchianIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self { period }
    }

    /// Highest value among the last `period` entries of `highs`.
    /// Returns `None` if there are fewer than `period` values or any is NaN.
    pub fn upper(&self, highs: &[f64]) -> Option<f64> {
        self.window(highs)
            .map(|w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Lowest value among the last `period` entries of `lows`.
    /// Returns `None` if there are fewer than `period` values or any is NaN.
    pub fn lower(&self, lows: &[f64]) -> Option<f64> {
        self.window(lows)
            .map(|w| w.iter().copied().fold(f64::INFINITY, f64::min))
    }

    fn window<'a>(&self, values: &'a [f64]) -> Option<&'a [f64]> {
        if values.len() < self.period {
            return None;
        }
        let window = &values[values.len() - self.period..];
        if window.iter().any(|v| v.is_nan()) {
            return None;
        }
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donchian_returns_none_with_insufficient_data() {
        let dc = DonchianIndicator::new(3);
        assert!(dc.upper(&[1.0, 2.0]).is_none());
        assert!(dc.lower(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn donchian_uses_only_trailing_window() {
        let dc = DonchianIndicator::new(3);
        let highs = [50.0, 12.0, 15.0, 14.0];
        let lows = [1.0, 9.0, 10.0, 13.0];
        // 50.0 and 1.0 fall outside the window
        assert_eq!(dc.upper(&highs), Some(15.0));
        assert_eq!(dc.lower(&lows), Some(9.0));
    }

    #[test]
    fn donchian_nan_in_window_yields_none() {
        let dc = DonchianIndicator::new(2);
        assert!(dc.upper(&[10.0, f64::NAN]).is_none());
        // NaN outside the window is irrelevant
        assert_eq!(dc.lower(&[f64::NAN, 3.0, 4.0]), Some(3.0));
    }
}
