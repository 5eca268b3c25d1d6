pub mod replay;

pub use replay::{ReplayFeed, ReplayScript};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    BrokerPosition, Error, ExecutionGateway, Offset, OrderSide, Result, TradeRecord,
};

/// Position held at paper start, read from the optional positions file.
///
/// ```json
/// [{"symbol": "SHFE.rb2010", "net": 5, "open_price": 3620.0}]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedPosition {
    pub symbol: String,
    pub net: i64,
    #[serde(default)]
    pub open_price: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Holding {
    net: i64,
    open_price: f64,
}

/// Simulated execution gateway.
///
/// Every target volume is filled immediately at the latest known price.
/// Prices are pushed in through the shared map returned by `prices_handle`
/// (the replay feed mirrors its ticks there). No orders ever leave the
/// process.
pub struct PaperClient {
    holdings: Arc<RwLock<HashMap<String, Holding>>>,
    /// Latest known price per instrument.
    prices: Arc<RwLock<HashMap<String, f64>>>,
    trades: Arc<RwLock<Vec<TradeRecord>>>,
}

impl Default for PaperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperClient {
    pub fn new() -> Self {
        info!("PaperClient initialized");
        Self {
            holdings: Arc::new(RwLock::new(HashMap::new())),
            prices: Arc::new(RwLock::new(HashMap::new())),
            trades: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Start with the given broker-side positions.
    pub fn with_positions(seed: impl IntoIterator<Item = SeedPosition>) -> Self {
        let client = Self::new();
        let holdings: HashMap<String, Holding> = seed
            .into_iter()
            .map(|p| {
                (
                    p.symbol,
                    Holding {
                        net: p.net,
                        open_price: if p.net == 0 { 0.0 } else { p.open_price },
                    },
                )
            })
            .collect();
        info!(positions = holdings.len(), "Paper positions seeded");
        Self {
            holdings: Arc::new(RwLock::new(holdings)),
            ..client
        }
    }

    /// Read a JSON array of `SeedPosition`.
    pub fn load_positions(path: &str) -> Result<Vec<SeedPosition>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read paper positions at '{path}': {e}"))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Update the latest price for an instrument.
    pub async fn update_price(&self, symbol: &str, price: f64) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    /// Shared price map, for feeds that mirror their ticks into the client.
    pub fn prices_handle(&self) -> Arc<RwLock<HashMap<String, f64>>> {
        self.prices.clone()
    }

    fn record(
        trades: &mut Vec<TradeRecord>,
        symbol: &str,
        side: OrderSide,
        offset: Offset,
        price: f64,
        volume: i64,
    ) {
        trades.push(TradeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            offset,
            price,
            volume,
            timestamp: Local::now().naive_local(),
        });
    }
}

#[async_trait]
impl ExecutionGateway for PaperClient {
    async fn set_target_volume(&self, symbol: &str, volume: i64) -> Result<()> {
        let mut holdings = self.holdings.write().await;
        let current = holdings.get(symbol).copied().unwrap_or_default();
        let delta = volume - current.net;
        if delta == 0 {
            return Ok(());
        }

        let price = match self.prices.read().await.get(symbol).copied() {
            Some(p) if p.is_finite() => p,
            // Flattening without a quote closes at cost.
            _ if current.net != 0 => current.open_price,
            _ => {
                return Err(Error::Gateway(format!(
                    "PaperClient has no price for '{symbol}'. Ensure ticks are flowing."
                )))
            }
        };

        let side = if delta > 0 { OrderSide::Buy } else { OrderSide::Sell };
        let mut trades = self.trades.write().await;

        let same_direction = current.net == 0 || current.net.signum() == volume.signum();
        let next = if same_direction && volume.abs() > current.net.abs() {
            let opened = volume.abs() - current.net.abs();
            Self::record(&mut trades, symbol, side, Offset::Open, price, opened);
            let cost = current.open_price * current.net.abs() as f64 + price * opened as f64;
            Holding {
                net: volume,
                open_price: cost / volume.abs() as f64,
            }
        } else if same_direction || volume == 0 {
            Self::record(&mut trades, symbol, side, Offset::Close, price, delta.abs());
            Holding {
                net: volume,
                open_price: if volume == 0 { 0.0 } else { current.open_price },
            }
        } else {
            // Reversal: close everything, then open the other side.
            Self::record(&mut trades, symbol, side, Offset::Close, price, current.net.abs());
            Self::record(&mut trades, symbol, side, Offset::Open, price, volume.abs());
            Holding {
                net: volume,
                open_price: price,
            }
        };

        debug!(
            symbol = %symbol,
            from = current.net,
            to = volume,
            price = price,
            "Paper fill simulated"
        );
        holdings.insert(symbol.to_string(), next);
        Ok(())
    }

    async fn positions(&self) -> Result<Vec<BrokerPosition>> {
        let holdings = self.holdings.read().await;
        let mut positions: Vec<BrokerPosition> = holdings
            .iter()
            .map(|(symbol, h)| BrokerPosition {
                symbol: symbol.clone(),
                net: h.net,
                long: h.net.max(0),
                short: (-h.net).max(0),
                open_price: h.open_price,
            })
            .collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    async fn trades(&self) -> Result<Vec<TradeRecord>> {
        Ok(self.trades.read().await.clone())
    }
}
