use serde::{Deserialize, Serialize};
use tracing::debug;

/// User-configurable sizing parameters, shared by every instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Maximum notional per instrument (C).
    pub market_cap: f64,
    /// Fraction of `market_cap` allowed to be lost between entry and the
    /// moving average (r, e.g. 0.06 = 6%).
    pub risk_fraction: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            market_cap: 1_000_000.0,
            risk_fraction: 0.06,
        }
    }
}

/// Computes unsigned entry quantities. The caller applies the sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> SizingConfig {
        self.config
    }

    /// Entry lots for a breakout at `price` given the reference
    /// `moving_average` and the contract `multiplier`.
    ///
    /// ```text
    /// notional_qty = C / (price * multiplier)
    /// risk_qty     = C * r / (|price - ma| * multiplier)
    /// qty          = floor(min(risk_qty, notional_qty))   (notional only when price == ma)
    /// ```
    ///
    /// An invalid result counts as 0, and 0 is raised to 1 so a breakout is
    /// never dropped.
    pub fn entry_quantity(&self, price: f64, moving_average: f64, multiplier: f64) -> i64 {
        let raw = self.raw_quantity(price, moving_average, multiplier);
        let lots = if raw.is_finite() { raw.floor() as i64 } else { 0 };
        if lots <= 0 {
            debug!(price = price, ma = moving_average, raw = raw, "Sizer underflow, using 1 lot");
            return 1;
        }
        lots
    }

    fn raw_quantity(&self, price: f64, moving_average: f64, multiplier: f64) -> f64 {
        let SizingConfig {
            market_cap,
            risk_fraction,
        } = self.config;
        let notional_qty = market_cap / (price * multiplier);
        if price == moving_average {
            return notional_qty;
        }
        let risk_qty = market_cap * risk_fraction / ((price - moving_average).abs() * multiplier);
        if risk_qty.is_nan() || notional_qty.is_nan() {
            return f64::NAN;
        }
        risk_qty.min(notional_qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer() -> PositionSizer {
        PositionSizer::new(SizingConfig {
            market_cap: 1_000_000.0,
            risk_fraction: 0.06,
        })
    }

    #[test]
    fn notional_cap_binds_when_smaller() {
        // risk: 60_000 / (2 * 10) = 3000, notional: 1_000_000 / 1000 = 1000
        assert_eq!(sizer().entry_quantity(100.0, 98.0, 10.0), 1000);
    }

    #[test]
    fn risk_cap_binds_when_smaller() {
        // risk: 60_000 / (50 * 10) = 120, notional: 1000
        assert_eq!(sizer().entry_quantity(100.0, 50.0, 10.0), 120);
    }

    #[test]
    fn price_equal_to_average_uses_notional_only() {
        assert_eq!(sizer().entry_quantity(100.0, 100.0, 10.0), 1000);
    }

    #[test]
    fn fractional_result_is_floored() {
        // notional: 1_000_000 / (3000 * 10) = 33.33
        assert_eq!(sizer().entry_quantity(3000.0, 3000.0, 10.0), 33);
    }

    #[test]
    fn underflow_is_raised_to_one() {
        // notional: 1_000_000 / (500_000 * 10) = 0.2
        assert_eq!(sizer().entry_quantity(500_000.0, 400_000.0, 10.0), 1);
    }

    #[test]
    fn nan_inputs_yield_one_lot() {
        assert_eq!(sizer().entry_quantity(f64::NAN, 98.0, 10.0), 1);
        assert_eq!(sizer().entry_quantity(100.0, f64::NAN, 10.0), 1);
    }

    #[test]
    fn zero_multiplier_yields_one_lot() {
        assert_eq!(sizer().entry_quantity(100.0, 98.0, 0.0), 1);
    }
}
