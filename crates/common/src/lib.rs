pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod sink;
pub mod types;
pub mod universe;

pub use clock::{Clock, LocalClock};
pub use config::Config;
pub use error::{Error, Result};
pub use exchange::{ExecutionGateway, MarketFeed};
pub use sink::{EventSink, TracingSink};
pub use types::*;
pub use universe::{FileUniverse, StaticUniverse, UniverseProvider};
