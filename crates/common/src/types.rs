use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One daily price bar (kline). The last bar of a series is the forming bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Latest tick for an instrument. `last_price` is NaN when the feed has no
/// valid price (e.g. before the session opens).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub last_price: f64,
    pub timestamp: NaiveDateTime,
}

/// Static contract metadata returned when subscribing to an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub symbol: String,
    /// Contract multiplier: price units per lot.
    pub volume_multiple: f64,
}

/// Fields whose change the engine polls once per wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedField {
    /// Tick `last_price`.
    LastPrice,
    /// Timestamp of the forming daily bar; changes when a new day starts.
    BarTimestamp,
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Whether a trade opened new exposure or closed existing exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Offset {
    Open,
    Close,
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Offset::Open => write!(f, "OPEN"),
            Offset::Close => write!(f, "CLOSE"),
        }
    }
}

/// Direction of a held position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> i64 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Position as reported by the broker account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    /// Signed net lots.
    pub net: i64,
    pub long: i64,
    pub short: i64,
    /// Average open cost of the net side, 0 when flat.
    pub open_price: f64,
}

impl std::fmt::Display for BrokerPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Contract: {}, Net Holding: {}, pos long: {}, pos short: {}, open cost (avg): {}",
            self.symbol, self.net, self.long, self.short, self.open_price
        )
    }
}

/// One entry of today's trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub offset: Offset,
    pub price: f64,
    pub volume: i64,
    pub timestamp: NaiveDateTime,
}

impl std::fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Contract: {}, direction: {}, offset: {}, price: {}, volume: {}, time: {}",
            self.symbol,
            self.side,
            self.offset,
            self.price,
            self.volume,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.f")
        )
    }
}

/// Whether the engine trades against a live broker or a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Current state of the strategy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

/// Commands sent to the engine via the command channel. They are observed
/// between loop iterations only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Stop,
    SaveSnapshot,
}

/// Structured business events emitted by the engine into an `EventSink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    ChannelRecomputed {
        symbol: String,
        upper_band: f64,
        lower_band: f64,
        moving_average: f64,
    },
    Entered {
        symbol: String,
        side: Side,
        quantity: i64,
        price: f64,
    },
    PartiallyReduced {
        symbol: String,
        from: i64,
        to: i64,
        price: f64,
        boundary: f64,
    },
    Exited {
        symbol: String,
        from: i64,
        price: f64,
        stop_level: f64,
    },
    InactiveFlattened {
        symbol: String,
        position: i64,
    },
    SnapshotSaved {
        instruments: usize,
    },
    SessionCutoff,
}

impl EngineEvent {
    /// Instrument the event refers to, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            EngineEvent::ChannelRecomputed { symbol, .. }
            | EngineEvent::Entered { symbol, .. }
            | EngineEvent::PartiallyReduced { symbol, .. }
            | EngineEvent::Exited { symbol, .. }
            | EngineEvent::InactiveFlattened { symbol, .. } => Some(symbol),
            EngineEvent::SnapshotSaved { .. } | EngineEvent::SessionCutoff => None,
        }
    }
}
