use std::time::Duration;

use chrono::NaiveTime;

use crate::{Error, Result, TradingMode};

/// Process configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Trading
    pub trading_mode: TradingMode,
    pub debug: bool,
    pub resume_intraday: bool,
    pub session_cutoff: NaiveTime,

    // Files
    pub strategy_config_path: String,
    pub universe_path: String,
    pub snapshot_path: String,
    pub save_interval: Duration,

    // Simulation
    pub replay_path: Option<String>,
    pub paper_positions_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let trading_mode = match required(&lookup, "TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let session_cutoff = match lookup("SESSION_CUTOFF") {
            Some(v) => NaiveTime::parse_from_str(v.trim(), "%H:%M").map_err(|e| {
                Error::Config(format!("SESSION_CUTOFF must be HH:MM, got '{v}': {e}"))
            })?,
            None => NaiveTime::from_hms_opt(14, 59, 0)
                .ok_or_else(|| Error::Config("invalid default session cutoff".into()))?,
        };

        let replay_path = lookup("REPLAY_PATH");
        if trading_mode == TradingMode::Paper && replay_path.is_none() {
            return Err(Error::Config(
                "REPLAY_PATH is required when TRADING_MODE=paper".into(),
            ));
        }

        Ok(Config {
            trading_mode,
            debug: parsed(&lookup, "DEBUG_MODE", false)?,
            resume_intraday: parsed(&lookup, "RESUME_INTRADAY", false)?,
            session_cutoff,
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategy.toml".to_string()),
            universe_path: lookup("UNIVERSE_PATH")
                .unwrap_or_else(|| "config/universe.txt".to_string()),
            snapshot_path: lookup("SNAPSHOT_PATH")
                .unwrap_or_else(|| "donma_state.json".to_string()),
            save_interval: Duration::from_secs(parsed(&lookup, "SAVE_INTERVAL_SECS", 600)?),
            replay_path,
            paper_positions_path: lookup("PAPER_POSITIONS_PATH"),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key} has invalid value '{v}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_for_optional_keys() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("TRADING_MODE", "paper"),
            ("REPLAY_PATH", "replay.json"),
        ]))
        .unwrap();

        assert_eq!(cfg.trading_mode, TradingMode::Paper);
        assert!(!cfg.debug);
        assert!(!cfg.resume_intraday);
        assert_eq!(cfg.session_cutoff, NaiveTime::from_hms_opt(14, 59, 0).unwrap());
        assert_eq!(cfg.save_interval, Duration::from_secs(600));
        assert_eq!(cfg.snapshot_path, "donma_state.json");
    }

    #[test]
    fn missing_trading_mode_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("TRADING_MODE"));
    }

    #[test]
    fn paper_mode_requires_replay() {
        let err = Config::from_lookup(lookup_from(&[("TRADING_MODE", "paper")])).unwrap_err();
        assert!(err.to_string().contains("REPLAY_PATH"));
    }

    #[test]
    fn invalid_flag_names_the_key() {
        let err = Config::from_lookup(lookup_from(&[
            ("TRADING_MODE", "live"),
            ("DEBUG_MODE", "sometimes"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DEBUG_MODE"));
    }

    #[test]
    fn custom_cutoff_and_interval() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("TRADING_MODE", "live"),
            ("SESSION_CUTOFF", "22:55"),
            ("SAVE_INTERVAL_SECS", "30"),
            ("RESUME_INTRADAY", "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.session_cutoff, NaiveTime::from_hms_opt(22, 55, 0).unwrap());
        assert_eq!(cfg.save_interval, Duration::from_secs(30));
        assert!(cfg.resume_intraday);
    }
}
