use serde::{Deserialize, Serialize};

use common::Bar;

use crate::indicators::{DonchianIndicator, SmaIndicator};

/// Trading levels for one instrument, valid for the current trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyChannel {
    /// Highest high of the `band_window` completed bars.
    pub upper_band: f64,
    /// Lowest low of the `band_window` completed bars.
    pub lower_band: f64,
    /// SMA of closes over `average_window` completed bars.
    pub moving_average: f64,
}

/// Derives a `DailyChannel` from a daily bar series whose last element is the
/// forming bar. The forming bar never contributes to any level.
#[derive(Debug, Clone)]
pub struct ChannelCalculator {
    bands: DonchianIndicator,
    average: SmaIndicator,
}

impl ChannelCalculator {
    pub fn new(band_window: usize, average_window: usize) -> Self {
        Self {
            bands: DonchianIndicator::new(band_window),
            average: SmaIndicator::new(average_window),
        }
    }

    /// Bars to request from the feed: both windows plus the forming bar.
    pub fn bar_count(&self) -> usize {
        self.bands.period.max(self.average.period) + 1
    }

    /// Returns `None` until enough completed bars exist, or if any level
    /// would be non-numeric.
    pub fn compute(&self, bars: &[Bar]) -> Option<DailyChannel> {
        let completed = bars.len().checked_sub(1).map(|n| &bars[..n])?;

        let highs: Vec<f64> = completed.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = completed.iter().map(|b| b.low).collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let channel = DailyChannel {
            upper_band: self.bands.upper(&highs)?,
            lower_band: self.bands.lower(&lows)?,
            moving_average: self.average.compute_lagged(&closes, 1)?,
        };

        channel.moving_average.is_finite().then_some(channel)
    }
}
