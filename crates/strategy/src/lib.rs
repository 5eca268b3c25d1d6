pub mod channel;
pub mod config;
pub mod indicators;
pub mod state;
pub mod trailing;

pub use channel::{ChannelCalculator, DailyChannel};
pub use config::{ChannelConfig, StrategyFileConfig};
pub use state::SymbolState;
pub use trailing::{Transition, TrailingExitEngine};
