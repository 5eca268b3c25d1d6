pub mod sizer;

pub use sizer::{PositionSizer, SizingConfig};
