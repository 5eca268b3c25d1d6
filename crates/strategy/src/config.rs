use serde::{Deserialize, Serialize};

use common::{Error, Result};
use risk::SizingConfig;
use tracing::debug;

/// Strategy parameter file (TOML).
///
/// Example `config/strategy.toml`:
/// ```toml
/// [channel]
/// band_window = 17
/// average_window = 22
///
/// [sizing]
/// market_cap = 1000000.0
/// risk_fraction = 0.06
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Completed bars in the breakout band (H).
    pub band_window: usize,
    /// Completed bars in the moving average (M).
    pub average_window: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            band_window: 17,
            average_window: 22,
        }
    }
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read strategy config at '{path}': {e}"))
        })?;
        let cfg = Self::parse(&content).map_err(|e| {
            Error::Config(format!("Failed to parse strategy config at '{path}': {e}"))
        })?;
        debug!(path = %path, "Strategy config loaded");
        Ok(cfg)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.channel.band_window == 0 || self.channel.average_window == 0 {
            return Err(Error::Config("channel windows must be >= 1".into()));
        }
        if !(self.sizing.market_cap > 0.0) {
            return Err(Error::Config("sizing.market_cap must be > 0".into()));
        }
        if !(self.sizing.risk_fraction > 0.0 && self.sizing.risk_fraction < 1.0) {
            return Err(Error::Config("sizing.risk_fraction must be in (0, 1)".into()));
        }
        Ok(())
    }
}
