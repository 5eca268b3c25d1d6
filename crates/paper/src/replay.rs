use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Bar, Error, FeedField, InstrumentInfo, MarketFeed, Result, Tick};

/// Replay file: per-instrument history plus a list of batches, each batch
/// delivered by one `wait_update`.
///
/// ```json
/// {
///   "instruments": {
///     "SHFE.rb2010": {"volume_multiple": 10.0, "bars": [
///       {"timestamp": "2020-07-27T00:00:00", "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}
///     ]}
///   },
///   "batches": [
///     [{"kind": "tick", "symbol": "SHFE.rb2010", "price": 3650.0}],
///     [{"kind": "bar", "symbol": "SHFE.rb2010", "bar": {"timestamp": "2020-07-28T00:00:00",
///       "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}}]
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayScript {
    pub instruments: BTreeMap<String, ReplayInstrument>,
    #[serde(default)]
    pub batches: Vec<Vec<ReplayUpdate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayInstrument {
    #[serde(default = "default_multiple")]
    pub volume_multiple: f64,
    /// Daily history, oldest first. The last bar is the forming one.
    #[serde(default)]
    pub bars: Vec<Bar>,
}

fn default_multiple() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayUpdate {
    /// `price: null` replays a tick without a valid price.
    Tick {
        symbol: String,
        price: Option<f64>,
        #[serde(default)]
        timestamp: Option<NaiveDateTime>,
    },
    /// Same timestamp as the forming bar replaces it, a later one opens a
    /// new trading day.
    Bar { symbol: String, bar: Bar },
}

struct Series {
    bars: Vec<Bar>,
    capacity: usize,
    tick: Option<Tick>,
}

/// Scripted market feed for paper runs and tests.
pub struct ReplayFeed {
    instruments: BTreeMap<String, ReplayInstrument>,
    series: HashMap<String, Series>,
    batches: VecDeque<Vec<ReplayUpdate>>,
    changed: HashMap<String, HashSet<FeedField>>,
    price_mirror: Option<Arc<RwLock<HashMap<String, f64>>>>,
}

impl ReplayFeed {
    pub fn new(script: ReplayScript) -> Self {
        info!(
            instruments = script.instruments.len(),
            batches = script.batches.len(),
            "Replay feed loaded"
        );
        Self {
            instruments: script.instruments,
            series: HashMap::new(),
            batches: script.batches.into(),
            changed: HashMap::new(),
            price_mirror: None,
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read replay file at '{path}': {e}")))?;
        Self::parse(&content)
    }

    /// Copy every valid tick price into `prices` (a paper client's map).
    pub fn with_price_mirror(mut self, prices: Arc<RwLock<HashMap<String, f64>>>) -> Self {
        self.price_mirror = Some(prices);
        self
    }

    /// Batches not yet delivered.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }

    fn mark(&mut self, symbol: &str, field: FeedField) {
        self.changed
            .entry(symbol.to_string())
            .or_default()
            .insert(field);
    }

    fn apply_tick(
        &mut self,
        symbol: &str,
        price: Option<f64>,
        timestamp: Option<NaiveDateTime>,
    ) -> Option<f64> {
        let series = self.series.get_mut(symbol)?;
        let price = price.unwrap_or(f64::NAN);
        let timestamp = timestamp
            .or_else(|| series.bars.last().map(|b| b.timestamp))
            .unwrap_or_default();
        let moved = match series.tick {
            Some(prev) => !(prev.last_price == price || (prev.last_price.is_nan() && price.is_nan())),
            None => true,
        };
        series.tick = Some(Tick {
            last_price: price,
            timestamp,
        });
        if moved {
            self.mark(symbol, FeedField::LastPrice);
        }
        price.is_finite().then_some(price)
    }

    fn apply_bar(&mut self, symbol: &str, bar: Bar) {
        let Some(series) = self.series.get_mut(symbol) else {
            return;
        };
        match series.bars.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => {
                series.bars.push(bar);
                let excess = series.bars.len().saturating_sub(series.capacity);
                series.bars.drain(..excess);
                self.mark(symbol, FeedField::BarTimestamp);
            }
        }
    }
}

#[async_trait]
impl MarketFeed for ReplayFeed {
    async fn subscribe(&mut self, symbol: &str, bar_count: usize) -> Result<InstrumentInfo> {
        let instrument = self
            .instruments
            .get(symbol)
            .ok_or_else(|| Error::UnknownInstrument(symbol.to_string()))?;
        let skip = instrument.bars.len().saturating_sub(bar_count);
        let bars = instrument.bars[skip..].to_vec();
        debug!(symbol = %symbol, bars = bars.len(), "Replay subscription");
        let info = InstrumentInfo {
            symbol: symbol.to_string(),
            volume_multiple: instrument.volume_multiple,
        };
        self.series.insert(
            symbol.to_string(),
            Series {
                bars,
                capacity: bar_count.max(1),
                tick: None,
            },
        );
        Ok(info)
    }

    async fn wait_update(&mut self) -> Result<bool> {
        self.changed.clear();
        // Let control tasks run between batches.
        tokio::task::yield_now().await;

        let Some(batch) = self.batches.pop_front() else {
            return Ok(false);
        };
        let mut mirrored = Vec::new();
        for update in batch {
            match update {
                ReplayUpdate::Tick {
                    symbol,
                    price,
                    timestamp,
                } => {
                    if let Some(p) = self.apply_tick(&symbol, price, timestamp) {
                        mirrored.push((symbol, p));
                    }
                }
                ReplayUpdate::Bar { symbol, bar } => self.apply_bar(&symbol, bar),
            }
        }
        if let Some(prices) = &self.price_mirror {
            let mut prices = prices.write().await;
            prices.extend(mirrored);
        }
        Ok(true)
    }

    fn tick(&self, symbol: &str) -> Option<Tick> {
        self.series.get(symbol).and_then(|s| s.tick)
    }

    fn bars(&self, symbol: &str) -> &[Bar] {
        self.series
            .get(symbol)
            .map(|s| s.bars.as_slice())
            .unwrap_or(&[])
    }

    fn has_changed(&self, symbol: &str, field: FeedField) -> bool {
        self.changed
            .get(symbol)
            .is_some_and(|fields| fields.contains(&field))
    }
}
