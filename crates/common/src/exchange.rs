use async_trait::async_trait;

use crate::{Bar, BrokerPosition, FeedField, InstrumentInfo, Result, Tick, TradeRecord};

/// Abstraction over the market data connection.
///
/// The engine is the only caller. It suspends exclusively inside
/// `wait_update`; everything else is a synchronous read of the data
/// delivered by the most recent wake-up.
#[async_trait]
pub trait MarketFeed: Send {
    /// Start receiving ticks and the last `bar_count` daily bars for `symbol`.
    async fn subscribe(&mut self, symbol: &str, bar_count: usize) -> Result<InstrumentInfo>;

    /// Block until the next batch of updates has been applied.
    /// Returns `false` once the feed has nothing more to deliver.
    async fn wait_update(&mut self) -> Result<bool>;

    /// Latest tick for `symbol`, if one has been received.
    fn tick(&self, symbol: &str) -> Option<Tick>;

    /// Daily bars for `symbol`, oldest first. The last bar is still forming.
    fn bars(&self, symbol: &str) -> &[Bar];

    /// True exactly during the wake-up in which `field` of `symbol` took a
    /// value different from the one observed before.
    fn has_changed(&self, symbol: &str, field: FeedField) -> bool;
}

/// Abstraction over the broker connection.
///
/// Target volumes are fire-and-forget: the gateway converges the account
/// toward the target asynchronously and owns fill reconciliation.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Set the desired signed net position for `symbol`.
    async fn set_target_volume(&self, symbol: &str, volume: i64) -> Result<()>;

    /// Broker-reported positions, including instruments outside the universe.
    async fn positions(&self) -> Result<Vec<BrokerPosition>>;

    /// Today's trade log.
    async fn trades(&self) -> Result<Vec<TradeRecord>>;
}
