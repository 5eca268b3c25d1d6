pub mod donchian;
pub mod sma;

pub use donchian::DonchianIndicator;
pub use sma::SmaIndicator;
